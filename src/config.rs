//! Runtime configuration read once at startup.
//!
//! Every setting comes from the process environment. The structs are built
//! through a lookup closure so tests can supply their own values without
//! touching the real environment.

use crate::nvdb::QueryParams;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NVDB_BASE_URL: &str = "https://nvdbapiles-v3.atlas.vegvesen.no";
pub const DEFAULT_INKLUDER: &str = "alle";

const DATABASE_KEYS: [&str; 5] = [
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "POSTGRES_HOST",
    "POSTGRES_PORT",
    "POSTGRES_DB",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Empty values count as unset, matching how the variables are usually
/// templated in `.env` files.
fn env_opt<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_string<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    env_opt(lookup, key).unwrap_or_else(|| default.to_string())
}

fn env_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env_opt(lookup, key)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&'static str> = DATABASE_KEYS
            .iter()
            .copied()
            .filter(|key| env_opt(&lookup, key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &str| env_opt(&lookup, key).unwrap_or_default();
        let raw_port = required("POSTGRES_PORT");
        let port = raw_port.parse::<u16>().map_err(|_| ConfigError::Invalid {
            key: "POSTGRES_PORT",
            value: raw_port.clone(),
        })?;

        Ok(Self {
            user: required("POSTGRES_USER"),
            password: required("POSTGRES_PASSWORD"),
            host: required("POSTGRES_HOST"),
            port,
            database: required("POSTGRES_DB"),
        })
    }

    /// Connection options with TLS disabled.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Settings for the NVDB collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvdbConfig {
    pub base_url: String,
    pub object_id: String,
    pub params: QueryParams,
    pub request_timeout: Option<Duration>,
}

impl NvdbConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let object_id =
            env_opt(&lookup, "NVDB_OBJECT_ID").ok_or(ConfigError::Missing(vec!["NVDB_OBJECT_ID"]))?;

        let params = QueryParams {
            inkluder: Some(env_string(&lookup, "NVDB_PARAM_INKLUDER", DEFAULT_INKLUDER)),
            srid: env_opt(&lookup, "NVDB_PARAM_SRID"),
            segmentering: env_opt(&lookup, "NVDB_PARAM_SEGMENTERING"),
            trafikantgruppe: env_opt(&lookup, "NVDB_PARAM_TRAFIKANTGRUPPE"),
            fylke: env_opt(&lookup, "NVDB_PARAM_FYLKE"),
            endret_etter: env_opt(&lookup, "NVDB_PARAM_ENDRET_ETTER"),
        };

        Ok(Self {
            base_url: env_string(&lookup, "NVDB_BASE_URL", DEFAULT_NVDB_BASE_URL),
            object_id,
            params,
            request_timeout: env_u64(&lookup, "NVDB_TIMEOUT_SECS")?.map(Duration::from_secs),
        })
    }
}

/// Everything a harvest run needs. Both halves are validated together so a
/// single error lists every missing variable.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub database: DatabaseConfig,
    pub nvdb: NvdbConfig,
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match (
            DatabaseConfig::from_lookup(&lookup),
            NvdbConfig::from_lookup(&lookup),
        ) {
            (Ok(database), Ok(nvdb)) => Ok(Self { database, nvdb }),
            (Err(ConfigError::Missing(mut db)), Err(ConfigError::Missing(nvdb))) => {
                db.extend(nvdb);
                Err(ConfigError::Missing(db))
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const DB_VARS: [(&str, &str); 5] = [
        ("POSTGRES_USER", "nvdb"),
        ("POSTGRES_PASSWORD", "secret"),
        ("POSTGRES_HOST", "localhost"),
        ("POSTGRES_PORT", "5432"),
        ("POSTGRES_DB", "roads"),
    ];

    #[test]
    fn test_database_config_reads_all_fields() {
        let config = DatabaseConfig::from_lookup(lookup_from(&DB_VARS)).unwrap();
        assert_eq!(config.user, "nvdb");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "roads");
    }

    #[test]
    fn test_database_config_lists_missing_variables() {
        let err = DatabaseConfig::from_lookup(lookup_from(&[
            ("POSTGRES_USER", "nvdb"),
            ("POSTGRES_PASSWORD", ""),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                "POSTGRES_PASSWORD",
                "POSTGRES_HOST",
                "POSTGRES_PORT",
                "POSTGRES_DB"
            ])
        );
    }

    #[test]
    fn test_database_config_rejects_bad_port() {
        let mut vars = DB_VARS.to_vec();
        vars[3] = ("POSTGRES_PORT", "fivefourthreetwo");
        let err = DatabaseConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POSTGRES_PORT", .. }));
    }

    #[test]
    fn test_database_config_debug_hides_password() {
        let config = DatabaseConfig::from_lookup(lookup_from(&DB_VARS)).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_nvdb_config_defaults() {
        let config = NvdbConfig::from_lookup(lookup_from(&[("NVDB_OBJECT_ID", "105")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_NVDB_BASE_URL);
        assert_eq!(config.object_id, "105");
        assert_eq!(config.params.inkluder.as_deref(), Some("alle"));
        assert!(config.params.srid.is_none());
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_nvdb_config_reads_optional_params() {
        let config = NvdbConfig::from_lookup(lookup_from(&[
            ("NVDB_OBJECT_ID", "105"),
            ("NVDB_PARAM_INKLUDER", "lokasjon"),
            ("NVDB_PARAM_SRID", "5973"),
            ("NVDB_PARAM_FYLKE", "50"),
            ("NVDB_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.params.inkluder.as_deref(), Some("lokasjon"));
        assert_eq!(config.params.srid.as_deref(), Some("5973"));
        assert_eq!(config.params.fylke.as_deref(), Some("50"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_harvest_config_combines_missing_variables() {
        let err = HarvestConfig::from_lookup(lookup_from(&[])).unwrap_err();
        match err {
            ConfigError::Missing(keys) => {
                assert_eq!(keys.len(), 6);
                assert_eq!(keys.last(), Some(&"NVDB_OBJECT_ID"));
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_harvest_config_requires_object_id() {
        let err = HarvestConfig::from_lookup(lookup_from(&DB_VARS)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["NVDB_OBJECT_ID"]));
    }
}
