//! Reactive repository over the `reservation` table.
//!
//! # Responsibilities
//! - Own the pooled connection factory
//! - Save one record, stream all records, delete all records
//! - Hand out transactions to the domain service
//!
//! # Design Decisions
//! - `find_all` is lazy: the query starts on first poll and rows are
//!   forwarded through a bounded channel, so dropping the stream stops it
//! - Store errors are surfaced unchanged; callers decide how to react

use std::str::FromStr;

use futures_util::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, Transaction};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::StoreConfig;
use crate::reservations::model::Reservation;

const ROW_BUFFER: usize = 16;

/// Failure reported by the relational store.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(#[from] pub sqlx::Error);

#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Open the connection pool and make sure the table exists.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?;

        // Every connection to an in-memory database sees its own database,
        // so those pools are pinned to one connection that never expires.
        let pool_options = if is_in_memory(&config.database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        let repository = Self { pool };
        repository.init_schema().await?;

        tracing::info!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            "Reservation store connected"
        );
        Ok(repository)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reservation (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist one reservation, returning it with its assigned id.
    pub async fn save(&self, reservation: Reservation) -> Result<Reservation, StoreError> {
        Ok(Self::save_with(&self.pool, reservation).await?)
    }

    /// Save using any executor, so the same statement runs inside a transaction.
    pub(crate) async fn save_with<'e, E>(
        executor: E,
        reservation: Reservation,
    ) -> Result<Reservation, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        match reservation.id {
            Some(id) => {
                sqlx::query_as::<_, Reservation>(
                    "UPDATE reservation SET name = ? WHERE id = ? RETURNING id, name",
                )
                .bind(reservation.name)
                .bind(id)
                .fetch_one(executor)
                .await
            }
            None => {
                sqlx::query_as::<_, Reservation>(
                    "INSERT INTO reservation (name) VALUES (?) RETURNING id, name",
                )
                .bind(reservation.name)
                .fetch_one(executor)
                .await
            }
        }
    }

    /// Stream every reservation. Order is whatever the store returns.
    pub fn find_all(&self) -> BoxStream<'static, Result<Reservation, StoreError>> {
        let pool = self.pool.clone();
        stream::once(async move {
            let (tx, rx) = mpsc::channel(ROW_BUFFER);
            tokio::spawn(async move {
                let mut rows =
                    sqlx::query_as::<_, Reservation>("SELECT id, name FROM reservation").fetch(&pool);
                while let Some(row) = rows.next().await {
                    let failed = row.is_err();
                    if tx.send(row.map_err(StoreError::from)).await.is_err() || failed {
                        break;
                    }
                }
            });
            ReceiverStream::new(rx)
        })
        .flatten()
        .boxed()
    }

    /// Remove every reservation, returning the number of rows deleted.
    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM reservation").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Start a transaction on a pooled connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    pub(crate) async fn memory_repository() -> ReservationRepository {
        let config = StoreConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
        };
        ReservationRepository::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn save_assigns_id() {
        let repository = memory_repository().await;
        let saved = repository.save(Reservation::new("Jigar")).await.unwrap();
        assert!(saved.id.is_some());
        assert_eq!(saved.name, "Jigar");
    }

    #[tokio::test]
    async fn save_with_id_updates_in_place() {
        let repository = memory_repository().await;
        let saved = repository.save(Reservation::new("Sid")).await.unwrap();
        let renamed = repository
            .save(Reservation { id: saved.id, name: "Samir".into() })
            .await
            .unwrap();
        assert_eq!(renamed.id, saved.id);

        let all: Vec<_> = repository.find_all().try_collect().await.unwrap();
        assert_eq!(all, vec![renamed]);
    }

    #[tokio::test]
    async fn find_all_streams_every_row() {
        let repository = memory_repository().await;
        for name in ["Dhaval", "Bhavin", "Vishal"] {
            repository.save(Reservation::new(name)).await.unwrap();
        }

        let mut names: Vec<String> = repository
            .find_all()
            .map_ok(|r| r.name)
            .try_collect()
            .await
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["Bhavin", "Dhaval", "Vishal"]);
    }

    #[tokio::test]
    async fn delete_all_empties_the_table() {
        let repository = memory_repository().await;
        repository.save(Reservation::new("Sharad")).await.unwrap();
        repository.save(Reservation::new("Sid")).await.unwrap();

        assert_eq!(repository.delete_all().await.unwrap(), 2);
        let all: Vec<_> = repository.find_all().try_collect().await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn dropping_find_all_releases_the_connection() {
        let repository = memory_repository().await;
        for i in 0..(ROW_BUFFER * 3) {
            repository.save(Reservation::new(format!("Name{i}"))).await.unwrap();
        }

        let mut rows = repository.find_all();
        assert!(rows.next().await.is_some());
        drop(rows);

        // The single pooled connection must come back for this to finish.
        let saved = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            repository.save(Reservation::new("Late")),
        )
        .await
        .expect("connection was not released")
        .unwrap();
        assert!(saved.id.is_some());
    }
}
