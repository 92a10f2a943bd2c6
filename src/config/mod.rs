//! Configuration module for Tribe.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default PubMed E-utilities summary endpoint.
pub const DEFAULT_PUBMED_BASE_URL: &str =
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Publication fetching settings
    pub pubmed: PubmedConfig,
}

/// Settings for on-demand publication fetches.
#[derive(Debug, Clone)]
pub struct PubmedConfig {
    pub base_url: String,
    /// Retries after the first failed request
    pub retries: u32,
    pub backoff: Duration,
    /// Maximum PMIDs per request
    pub batch_size: usize,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PUBMED_BASE_URL.to_string(),
            retries: 3,
            backoff: Duration::from_millis(500),
            batch_size: 5000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("TRIBE_DB_PATH")
            .unwrap_or_else(|_| "./data/tribe.sqlite".to_string())
            .into();

        let log_level = env::var("TRIBE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = PubmedConfig::default();
        let pubmed = PubmedConfig {
            base_url: env::var("TRIBE_PUBMED_BASE_URL").unwrap_or(defaults.base_url),
            retries: parse_var("TRIBE_PUBMED_RETRIES", defaults.retries),
            backoff: Duration::from_millis(parse_var(
                "TRIBE_PUBMED_BACKOFF_MS",
                defaults.backoff.as_millis() as u64,
            )),
            batch_size: parse_var("TRIBE_PUBMED_BATCH_SIZE", defaults.batch_size).max(1),
        };

        Self {
            db_path,
            log_level,
            pubmed,
        }
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("TRIBE_DB_PATH");
        env::remove_var("TRIBE_LOG_LEVEL");
        env::remove_var("TRIBE_PUBMED_BASE_URL");
        env::remove_var("TRIBE_PUBMED_RETRIES");
        env::remove_var("TRIBE_PUBMED_BACKOFF_MS");
        env::remove_var("TRIBE_PUBMED_BATCH_SIZE");

        let config = Config::from_env();

        assert_eq!(config.db_path, PathBuf::from("./data/tribe.sqlite"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.pubmed.base_url, DEFAULT_PUBMED_BASE_URL);
        assert_eq!(config.pubmed.retries, 3);
        assert_eq!(config.pubmed.backoff, Duration::from_millis(500));
        assert_eq!(config.pubmed.batch_size, 5000);
    }

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        env::set_var("TRIBE_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var("TRIBE_TEST_PARSE_VAR", 7u32), 7);
        env::set_var("TRIBE_TEST_PARSE_VAR", " 12 ");
        assert_eq!(parse_var("TRIBE_TEST_PARSE_VAR", 7u32), 12);
        env::remove_var("TRIBE_TEST_PARSE_VAR");
    }
}
