use mongodb::error::{Error as MongoError, ErrorKind};
use thiserror::Error;

pub type MongoResult<T> = Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert score for user `{user_id}`")]
    InsertScore {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB did not return an ObjectId for the inserted score")]
    MissingInsertedId,
    #[error("failed to query scores ({query})")]
    QueryScores {
        query: &'static str,
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    /// Whether the server answered and refused the operation, as opposed to being unreachable.
    pub fn is_rejection(&self) -> bool {
        let source = match self {
            MongoDaoError::InsertScore { source, .. } | MongoDaoError::QueryScores { source, .. } => {
                source
            }
            MongoDaoError::MissingInsertedId => return true,
            _ => return false,
        };

        matches!(
            *source.kind,
            ErrorKind::Command(_) | ErrorKind::Write(_) | ErrorKind::Authentication { .. }
        )
    }
}
