//! Reservation domain service.
//!
//! Saves a batch of names inside one transaction. Any validation or store
//! failure rolls the whole batch back.

use thiserror::Error;

use crate::reservations::model::{validate_name, InvalidNameError, Reservation};
use crate::reservations::repository::{ReservationRepository, StoreError};

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(StoreError(e))
    }
}

#[derive(Debug, Clone)]
pub struct ReservationService {
    repository: ReservationRepository,
}

impl ReservationService {
    pub fn new(repository: ReservationRepository) -> Self {
        Self { repository }
    }

    /// Validate and persist every name, in argument order, as one transaction.
    ///
    /// Each name is checked after its row is written; a failing name rolls
    /// back every row written by this call.
    pub async fn save_names<I, S>(&self, names: I) -> Result<Vec<Reservation>, ReservationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        tracing::info!(names = ?names, "Saving names");

        let mut tx = self.repository.begin().await?;
        let mut saved = Vec::with_capacity(names.len());

        for name in names {
            let reservation =
                ReservationRepository::save_with(&mut *tx, Reservation::new(name)).await?;

            if let Err(e) = validate_name(&reservation.name) {
                tracing::warn!(name = %reservation.name, error = %e, "Rejecting batch");
                tx.rollback().await?;
                return Err(e.into());
            }
            tracing::debug!(id = ?reservation.id, name = %reservation.name, "Name accepted");
            saved.push(reservation);
        }

        tx.commit().await?;
        tracing::info!(count = saved.len(), "Names saved");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservations::repository::tests::memory_repository;
    use futures_util::TryStreamExt;

    async fn stored_names(repository: &ReservationRepository) -> Vec<String> {
        let mut names: Vec<String> = repository
            .find_all()
            .map_ok(|r| r.name)
            .try_collect()
            .await
            .unwrap();
        names.sort();
        names
    }

    #[tokio::test]
    async fn saves_valid_names_in_order() {
        let repository = memory_repository().await;
        let service = ReservationService::new(repository.clone());

        let saved = service.save_names(["Viral", "Ankur", "Hitesh"]).await.unwrap();
        let names: Vec<_> = saved.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Viral", "Ankur", "Hitesh"]);
        assert!(saved.iter().all(|r| r.id.is_some()));

        assert_eq!(stored_names(&repository).await, vec!["Ankur", "Hitesh", "Viral"]);
    }

    #[tokio::test]
    async fn single_valid_name_is_persisted_once() {
        let repository = memory_repository().await;
        let service = ReservationService::new(repository.clone());

        let saved = service.save_names(["Parag"]).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "Parag");
        assert!(saved[0].id.is_some());
        assert_eq!(stored_names(&repository).await, vec!["Parag"]);
    }

    #[tokio::test]
    async fn lowercase_name_fails_and_persists_nothing() {
        let repository = memory_repository().await;
        let service = ReservationService::new(repository.clone());

        let err = service.save_names(["bob"]).await.unwrap_err();
        assert!(matches!(
            err,
            ReservationError::InvalidName(InvalidNameError::NotCapitalized(_))
        ));
        assert!(stored_names(&repository).await.is_empty());
    }

    #[tokio::test]
    async fn empty_name_fails() {
        let repository = memory_repository().await;
        let service = ReservationService::new(repository.clone());

        let err = service.save_names([""]).await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidName(InvalidNameError::Empty)));
        assert!(stored_names(&repository).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_name_rolls_back_whole_batch() {
        let repository = memory_repository().await;
        let service = ReservationService::new(repository.clone());
        repository.save(Reservation::new("Existing")).await.unwrap();

        let result = service.save_names(["Rikin", "parag", "Hitesh"]).await;
        assert!(result.is_err());
        assert_eq!(stored_names(&repository).await, vec!["Existing"]);
    }
}
