use crate::domain::OwnerId;
use crate::domain::ports::{ClockBox, LedgerStoreBox};
use crate::error::Result;
use crate::infrastructure::clock::{FixedClock, SystemClock};
use crate::infrastructure::in_memory::InMemoryLedgerStore;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Where the ledger lives. `None` keeps everything in memory for the
    /// lifetime of the process.
    pub db_path: Option<PathBuf>,
    /// Organizer every command acts as.
    pub owner: OwnerId,
    /// Pins "today" instead of reading the wall clock.
    pub today: Option<NaiveDate>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            owner: 1,
            today: None,
        }
    }
}

impl LedgerConfig {
    pub fn open_store(&self) -> Result<LedgerStoreBox> {
        let Some(path) = &self.db_path else {
            debug!("using ephemeral in-memory store");
            return Ok(Box::new(InMemoryLedgerStore::new()));
        };
        Self::open_persistent(path)
    }

    #[cfg(feature = "storage-rocksdb")]
    fn open_persistent(path: &Path) -> Result<LedgerStoreBox> {
        debug!(path = %path.display(), "opening RocksDB store");
        Ok(Box::new(crate::infrastructure::rocksdb::RocksDBStore::open(path)?))
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    fn open_persistent(path: &Path) -> Result<LedgerStoreBox> {
        tracing::warn!(
            path = %path.display(),
            "'storage-rocksdb' feature is not enabled, falling back to a JSON snapshot of the in-memory store"
        );
        Ok(Box::new(InMemoryLedgerStore::open_snapshot(path)?))
    }

    pub fn clock(&self) -> ClockBox {
        match self.today {
            Some(today) => Box::new(FixedClock::new(today)),
            None => Box::new(SystemClock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_clock() {
        let config = LedgerConfig {
            today: Some("2024-03-20".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(config.clock().today().to_string(), "2024-03-20");
    }

    #[tokio::test]
    async fn test_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            db_path: Some(dir.path().join("ledger")),
            ..Default::default()
        };
        let created = config
            .open_store()
            .unwrap()
            .insert_challenge(
                1,
                crate::domain::challenge::ChallengeInput {
                    title: "Run".to_string(),
                    goal_km: 10.0,
                    start_date: "2024-01-01".to_string(),
                    end_date: "2024-01-31".to_string(),
                    ..Default::default()
                }
                .validate()
                .unwrap(),
                "2024-01-01T00:00:00".parse().unwrap(),
            )
            .await
            .unwrap();

        let reopened = config.open_store().unwrap();
        assert_eq!(reopened.get_challenge(created.id, 1).await.unwrap(), Some(created));
    }
}
