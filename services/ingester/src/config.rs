//! Ingester configuration.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ingestion::{FetchConfig, WorkerPolicy, DEFAULT_MAX_CHUNK_SIZE};
use storage::{ObjectStorageConfig, DEFAULT_QUEUE_KEY};

/// Top-level ingester configuration.
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// PostgreSQL catalog; without it the catalog is built from seed files
    pub database_url: Option<String>,

    /// Redis URL for the ingest queue
    pub redis_url: String,

    /// Sorted-set key of the ingest queue
    pub queue_key: String,

    /// Field store location
    pub storage: ObjectStorageConfig,

    /// Ceiling in estimated bytes for one ingestion chunk
    pub max_chunk_size: usize,

    pub fetch: FetchConfig,

    pub policy: WorkerPolicy,
}

impl IngesterConfig {
    /// Load configuration from environment variables, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let defaults = ObjectStorageConfig::default();
        let storage = ObjectStorageConfig {
            endpoint: var("S3_ENDPOINT", &defaults.endpoint),
            bucket: var("S3_BUCKET", &defaults.bucket),
            access_key_id: var("S3_ACCESS_KEY", &defaults.access_key_id),
            secret_access_key: var("S3_SECRET_KEY", &defaults.secret_access_key),
            region: var("S3_REGION", &defaults.region),
            allow_http: lookup("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(defaults.allow_http),
            local_path: lookup("FIELD_STORE_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        };

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                fetch_defaults.request_timeout.as_secs(),
            )?),
            max_retries: parse_or(&lookup, "FETCH_MAX_RETRIES", fetch_defaults.max_retries)?,
            initial_retry_delay: Duration::from_secs(parse_or(
                &lookup,
                "FETCH_RETRY_DELAY_SECS",
                fetch_defaults.initial_retry_delay.as_secs(),
            )?),
            ..fetch_defaults
        };

        let policy_defaults = WorkerPolicy::default();
        let policy = WorkerPolicy {
            max_age: chrono::Duration::hours(parse_or(
                &lookup,
                "REQUEST_MAX_AGE_HOURS",
                policy_defaults.max_age.num_hours(),
            )?),
            missing_retry: Duration::from_secs(parse_or(
                &lookup,
                "MISSING_RETRY_SECS",
                policy_defaults.missing_retry.as_secs(),
            )?),
            failure_retry: Duration::from_secs(parse_or(
                &lookup,
                "FAILURE_RETRY_SECS",
                policy_defaults.failure_retry.as_secs(),
            )?),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|u| !u.is_empty()),
            redis_url: var("REDIS_URL", "redis://redis:6379"),
            queue_key: var("QUEUE_KEY", DEFAULT_QUEUE_KEY),
            storage,
            max_chunk_size: parse_or(&lookup, "MAX_CHUNK_SIZE", DEFAULT_MAX_CHUNK_SIZE)?,
            fetch,
            policy,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<IngesterConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IngesterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.queue_key, DEFAULT_QUEUE_KEY);
        assert_eq!(config.max_chunk_size, 50 * 1024 * 1024);
        assert_eq!(config.policy.max_age, chrono::Duration::hours(12));
        assert_eq!(config.policy.missing_retry, Duration::from_secs(300));
        assert_eq!(config.policy.failure_retry, Duration::from_secs(240));
        assert!(config.storage.local_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgresql://wx@localhost/wx"),
            ("FIELD_STORE_PATH", "/var/lib/wx/fields"),
            ("MAX_CHUNK_SIZE", "1048576"),
            ("FETCH_MAX_RETRIES", "5"),
            ("MISSING_RETRY_SECS", "60"),
            ("S3_ALLOW_HTTP", "false"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgresql://wx@localhost/wx"));
        assert_eq!(
            config.storage.local_path,
            Some(PathBuf::from("/var/lib/wx/fields"))
        );
        assert_eq!(config.max_chunk_size, 1_048_576);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.policy.missing_retry, Duration::from_secs(60));
        assert!(!config.storage.allow_http);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config(&[("MAX_CHUNK_SIZE", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_CHUNK_SIZE"));
    }
}
