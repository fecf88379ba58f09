mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchScoreStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        if err.is_rejection() {
            StorageError::rejected(err.to_string(), err)
        } else {
            StorageError::unavailable(err.to_string(), err)
        }
    }
}
