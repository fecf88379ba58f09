use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DB: &str = "reflex";
const BASE_URL_VAR: &str = "COUCH_BASE_URL";
const DB_VAR: &str = "COUCH_DB";
const USERNAME_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";

/// Where the score database lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CouchConfig {
    /// Build the configuration from `COUCH_BASE_URL` (required), `COUCH_DB`
    /// (optional, defaults to `reflex`) and the `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = non_blank(BASE_URL_VAR)
            .map(|url| url.trim_end_matches('/').to_owned())
            .ok_or(CouchDaoError::MissingEnvVar { var: BASE_URL_VAR })?;
        let database = non_blank(DB_VAR).unwrap_or_else(|| DEFAULT_DB.to_owned());

        // Basic auth only applies when both halves are set.
        let (username, password) = match (non_blank(USERNAME_VAR), lookup(PASSWORD_VAR)) {
            (Some(username), Some(password)) => (Some(username), Some(password)),
            _ => (None, None),
        };

        Ok(Self {
            base_url,
            database,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> CouchResult<CouchConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        CouchConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn database_defaults_to_reflex() {
        let config = config_from(&[("COUCH_BASE_URL", "http://couch:5984/")]).unwrap();
        assert_eq!(config.base_url, "http://couch:5984");
        assert_eq!(config.database, "reflex");
        assert!(config.username.is_none());
    }

    #[test]
    fn base_url_is_required() {
        assert!(matches!(
            config_from(&[("COUCH_DB", "scores")]),
            Err(CouchDaoError::MissingEnvVar { var: "COUCH_BASE_URL" })
        ));
        assert!(config_from(&[("COUCH_BASE_URL", "  ")]).is_err());
    }

    #[test]
    fn credentials_need_both_halves() {
        let config = config_from(&[
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_DB", "scores"),
            ("COUCH_USERNAME", "admin"),
            ("COUCH_PASSWORD", "s3cret"),
        ])
        .unwrap();
        assert_eq!(config.database, "scores");
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("s3cret"));

        let config = config_from(&[
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_USERNAME", "admin"),
        ])
        .unwrap();
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }
}
