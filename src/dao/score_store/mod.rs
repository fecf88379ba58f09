#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{fmt, str::FromStr, sync::Arc};

use crate::dao::models::{NewScoreEntity, ScoreEntity, ScoreId};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use thiserror::Error;

/// Append-only document store for score records with ascending-score projections.
///
/// Implementations keep an index on `score` (globally and per user) and return
/// records best first. Ordering between equal scores is left to the backend.
pub trait ScoreStore: Send + Sync {
    /// Persist a new record and return the identifier assigned by the store.
    fn insert_score(&self, score: NewScoreEntity) -> BoxFuture<'static, StorageResult<ScoreId>>;
    /// Up to `limit` records across all users, lowest score first.
    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    /// Every record of `user_id`, lowest score first.
    fn user_scores(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    /// Lowest-score record of `user_id`, if any.
    fn user_best(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>>;
    /// Cheap round-trip used by the storage supervisor to detect outages.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-open the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Environment variable selecting the score store.
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// Score store implementations compiled into this binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
    Memory,
}

/// `STORAGE_BACKEND` named a store that is unknown or not compiled in.
#[derive(Debug, Error)]
#[error("unknown storage backend `{0}` (available: {available})", available = StorageBackend::available())]
pub struct UnknownBackend(pub String);

impl StorageBackend {
    /// Read [`STORAGE_BACKEND_ENV`], falling back to [`StorageBackend::default`].
    pub fn from_env() -> Result<Self, UnknownBackend> {
        match std::env::var(STORAGE_BACKEND_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Self::default()),
        }
    }

    fn available() -> String {
        let mut names = Vec::new();
        #[cfg(feature = "mongo-store")]
        names.push("mongo");
        #[cfg(feature = "couch-store")]
        names.push("couch");
        names.push("memory");
        names.join(", ")
    }

    /// Connect to the selected store using its environment configuration.
    pub async fn connect(self) -> StorageResult<Arc<dyn ScoreStore>> {
        match self {
            #[cfg(feature = "mongo-store")]
            StorageBackend::Mongo => {
                let config = mongodb::MongoConfig::from_env().await?;
                let store = mongodb::MongoScoreStore::connect(config).await?;
                Ok(Arc::new(store))
            }
            #[cfg(feature = "couch-store")]
            StorageBackend::Couch => {
                let config = couchdb::CouchConfig::from_env()?;
                let store = couchdb::CouchScoreStore::connect(config).await?;
                Ok(Arc::new(store))
            }
            StorageBackend::Memory => Ok(Arc::new(memory::InMemoryScoreStore::new())),
        }
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        #[cfg(feature = "mongo-store")]
        return StorageBackend::Mongo;
        #[cfg(all(not(feature = "mongo-store"), feature = "couch-store"))]
        return StorageBackend::Couch;
        #[cfg(not(any(feature = "mongo-store", feature = "couch-store")))]
        return StorageBackend::Memory;
    }
}

impl FromStr for StorageBackend {
    type Err = UnknownBackend;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(StorageBackend::Couch),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(UnknownBackend(value.to_owned())),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            #[cfg(feature = "mongo-store")]
            StorageBackend::Mongo => "mongo",
            #[cfg(feature = "couch-store")]
            StorageBackend::Couch => "couch",
            StorageBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        #[cfg(feature = "mongo-store")]
        assert_eq!("mongodb".parse::<StorageBackend>().unwrap(), StorageBackend::Mongo);
        #[cfg(feature = "couch-store")]
        assert_eq!("couch".parse::<StorageBackend>().unwrap(), StorageBackend::Couch);
        assert!("redis".parse::<StorageBackend>().is_err());
    }
}
