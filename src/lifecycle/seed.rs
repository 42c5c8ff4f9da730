//! Startup sample data.
//!
//! # Data Flow
//! ```text
//! process ready
//!   → delete_all → save(names…) → find_all         (one correlation id)
//!   → delete_all → ReservationService::save_names(validated_names…)
//! ```
//!
//! # Design Decisions
//! - Runs detached from whoever signals readiness
//! - The two pipelines run one after the other; running them concurrently
//!   lets the second `delete_all` race the first pipeline's saves
//! - Saves are issued one at a time so ids follow the list order
//! - The correlation id travels as an explicit `PipelineContext` argument
//!   and as a field on the pipeline's tracing span

use futures_util::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::schema::SeedConfig;
use crate::reservations::{
    Reservation, ReservationError, ReservationRepository, ReservationService, StoreError,
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seeding store failed: {0}")]
    Store(#[from] StoreError),

    #[error("seeding validated names failed: {0}")]
    Reservation(#[from] ReservationError),
}

/// Metadata shared by every stage of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineContext {
    pub correlation_id: Uuid,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct SeedReport {
    pub context: PipelineContext,
    /// What the first pipeline read back after saving.
    pub fetched: Vec<Reservation>,
    /// What the domain service persisted.
    pub validated: Vec<Reservation>,
}

#[derive(Debug, Clone)]
pub struct SampleDataSeeder {
    repository: ReservationRepository,
    service: ReservationService,
    config: SeedConfig,
}

impl SampleDataSeeder {
    pub fn new(repository: ReservationRepository, config: SeedConfig) -> Self {
        Self {
            service: ReservationService::new(repository.clone()),
            repository,
            config,
        }
    }

    /// Run both pipelines on a detached task.
    pub fn spawn(self) -> JoinHandle<Result<SeedReport, SeedError>> {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Sample data seeding failed");
            }
            result
        })
    }

    pub async fn run(&self) -> Result<SeedReport, SeedError> {
        let context = PipelineContext::new();
        let span = tracing::info_span!("seed", correlation_id = %context.correlation_id);

        let fetched = self.populate(&context).instrument(span).await?;
        let validated = self.populate_validated().await?;

        tracing::info!(
            correlation_id = %context.correlation_id,
            fetched = fetched.len(),
            validated = validated.len(),
            "Sample data seeded"
        );
        Ok(SeedReport {
            context,
            fetched,
            validated,
        })
    }

    async fn populate(&self, context: &PipelineContext) -> Result<Vec<Reservation>, StoreError> {
        let deleted = self.repository.delete_all().await?;
        tracing::debug!(correlation_id = %context.correlation_id, deleted, "Store cleared");

        let saved: Vec<Reservation> = stream::iter(self.config.names.iter().cloned())
            .then(|name| self.repository.save(Reservation::new(name)))
            .try_collect()
            .await?;
        tracing::debug!(correlation_id = %context.correlation_id, saved = saved.len(), "Names saved");

        self.repository
            .find_all()
            .inspect_ok(|reservation| {
                tracing::info!(
                    correlation_id = %context.correlation_id,
                    id = ?reservation.id,
                    name = %reservation.name,
                    "Seeded reservation"
                )
            })
            .try_collect()
            .await
    }

    async fn populate_validated(&self) -> Result<Vec<Reservation>, ReservationError> {
        self.repository.delete_all().await?;
        self.service
            .save_names(self.config.validated_names.iter())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservations::repository::tests::memory_repository;

    fn names(reservations: &[Reservation]) -> Vec<String> {
        let mut names: Vec<String> = reservations.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn seeds_both_lists_in_order() {
        let repository = memory_repository().await;
        repository.save(Reservation::new("Stale")).await.unwrap();

        let config = SeedConfig::default();
        let report = SampleDataSeeder::new(repository.clone(), config.clone())
            .spawn()
            .await
            .unwrap()
            .unwrap();

        let mut expected_first = config.names.clone();
        expected_first.sort();
        assert_eq!(names(&report.fetched), expected_first);
        assert_eq!(
            report.validated.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            config.validated_names.iter().map(String::as_str).collect::<Vec<_>>()
        );

        let remaining: Vec<Reservation> = repository.find_all().try_collect().await.unwrap();
        let mut expected_final = config.validated_names.clone();
        expected_final.sort();
        assert_eq!(names(&remaining), expected_final);
    }

    #[tokio::test]
    async fn first_pipeline_assigns_ids_in_list_order() {
        let repository = memory_repository().await;
        let config = SeedConfig::default();
        let seeder = SampleDataSeeder::new(repository, config.clone());

        let mut fetched = seeder.populate(&PipelineContext::new()).await.unwrap();
        fetched.sort_by_key(|reservation| reservation.id);
        assert_eq!(
            fetched.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            config.names.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn invalid_validated_name_leaves_store_empty() {
        let repository = memory_repository().await;
        let config = SeedConfig {
            enabled: true,
            names: vec!["Dhaval".into()],
            validated_names: vec!["Viral".into(), "ankur".into()],
        };

        let result = SampleDataSeeder::new(repository.clone(), config).run().await;
        assert!(matches!(
            result,
            Err(SeedError::Reservation(ReservationError::InvalidName(_)))
        ));

        let remaining: Vec<Reservation> = repository.find_all().try_collect().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn every_context_gets_a_fresh_id() {
        assert_ne!(PipelineContext::new(), PipelineContext::new());
    }
}
