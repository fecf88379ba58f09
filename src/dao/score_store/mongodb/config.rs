use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "reflex";
const APP_NAME: &str = "reflex-back";

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options
            .app_name
            .get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Build the configuration from `MONGO_URI` (required) and `MONGO_DB` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_database_and_app_name() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", None)
            .await
            .unwrap();
        assert_eq!(config.database_name, "reflex");
        assert_eq!(config.options.app_name.as_deref(), Some("reflex-back"));
    }

    #[tokio::test]
    async fn keeps_app_name_from_uri() {
        let config =
            MongoConfig::from_uri("mongodb://localhost:27017/?appName=scoreboard", Some("scores"))
                .await
                .unwrap();
        assert_eq!(config.database_name, "scores");
        assert_eq!(config.options.app_name.as_deref(), Some("scoreboard"));
    }
}
