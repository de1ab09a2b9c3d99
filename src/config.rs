//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_IMPORT_MAX_DELIVER, DEFAULT_UPLOAD_DIR};
use crate::services::import::{DateFallback, ImportSettings};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials, used only when both are set
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    pub db_max_connections: u32,

    /// Where accepted uploads wait for the import runner
    pub upload_dir: PathBuf,

    /// Pipeline tunables
    pub import: ImportSettings,

    /// JetStream delivery attempts per import job
    pub max_deliver: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let import = ImportSettings::from_lookup(&lookup)?;

        let max_deliver: i64 = parse_var(var("IMPORT_MAX_DELIVER"), "IMPORT_MAX_DELIVER", DEFAULT_IMPORT_MAX_DELIVER)?;
        if max_deliver < 1 {
            anyhow::bail!("IMPORT_MAX_DELIVER must be at least 1");
        }

        Ok(Self {
            nats_url,
            nats_user: var("NATS_USER"),
            nats_password: var("NATS_PASSWORD"),
            database_url,
            db_max_connections: parse_var(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
            upload_dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())),
            import,
            max_deliver,
        })
    }

    pub fn import_settings(&self) -> ImportSettings {
        self.import
    }
}

impl ImportSettings {
    /// Import tunables alone; usable without a database configured
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let checkpoint_interval: usize =
            parse_var(var("IMPORT_CHECKPOINT_INTERVAL"), "IMPORT_CHECKPOINT_INTERVAL", DEFAULT_CHECKPOINT_INTERVAL)?;
        if checkpoint_interval == 0 {
            anyhow::bail!("IMPORT_CHECKPOINT_INTERVAL must be greater than 0");
        }

        let date_fallback = match var("IMPORT_DATE_FALLBACK") {
            Some(value) => value
                .parse::<DateFallback>()
                .map_err(|e| anyhow::anyhow!("IMPORT_DATE_FALLBACK: {}", e))?,
            None => DateFallback::default(),
        };

        let precount = match var("IMPORT_PRECOUNT") {
            Some(value) => parse_bool(&value).context("IMPORT_PRECOUNT must be a boolean")?,
            None => true,
        };

        Ok(Self {
            checkpoint_interval,
            date_fallback,
            precount,
        })
    }
}

fn parse_var<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.trim().parse().with_context(|| format!("{} has an invalid value: {}", name, v)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_requires_database_url() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://test")]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.import, ImportSettings::default());
        assert_eq!(config.max_deliver, 3);
        assert_eq!(config.upload_dir, PathBuf::from("tmp/uploads/csv_imports"));
        assert!(config.nats_user.is_none());
    }

    #[test]
    fn test_config_import_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("IMPORT_CHECKPOINT_INTERVAL", "10"),
            ("IMPORT_DATE_FALLBACK", "reject"),
            ("IMPORT_PRECOUNT", "false"),
            ("UPLOAD_DIR", "/var/lib/uploads"),
        ])
        .unwrap();

        let settings = config.import_settings();
        assert_eq!(settings.checkpoint_interval, 10);
        assert_eq!(settings.date_fallback, DateFallback::Reject);
        assert!(!settings.precount);
        assert_eq!(config.upload_dir, PathBuf::from("/var/lib/uploads"));
    }

    #[test]
    fn test_config_rejects_zero_checkpoint_interval() {
        let err = config_from(&[("DATABASE_URL", "postgres://test"), ("IMPORT_CHECKPOINT_INTERVAL", "0")])
            .unwrap_err();
        assert!(err.to_string().contains("IMPORT_CHECKPOINT_INTERVAL"));
    }

    #[test]
    fn test_config_rejects_unknown_date_fallback() {
        assert!(config_from(&[("DATABASE_URL", "postgres://test"), ("IMPORT_DATE_FALLBACK", "skip")]).is_err());
    }

    fn settings_from(vars: &[(&str, &str)]) -> Result<ImportSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ImportSettings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_import_settings_without_database_url() {
        let settings = settings_from(&[("IMPORT_DATE_FALLBACK", "reject"), ("IMPORT_PRECOUNT", "no")]).unwrap();
        assert_eq!(settings.date_fallback, DateFallback::Reject);
        assert!(!settings.precount);
        assert_eq!(settings.checkpoint_interval, 50);
    }

    #[test]
    fn test_import_settings_report_invalid_values() {
        let err = settings_from(&[("IMPORT_DATE_FALLBACK", "skip")]).unwrap_err();
        assert!(err.to_string().contains("IMPORT_DATE_FALLBACK"));
        let err = settings_from(&[("IMPORT_CHECKPOINT_INTERVAL", "0")]).unwrap_err();
        assert!(err.to_string().contains("IMPORT_CHECKPOINT_INTERVAL"));
        assert!(settings_from(&[("IMPORT_PRECOUNT", "maybe")]).is_err());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config_from(&[("DATABASE_URL", "postgres://test"), ("NATS_USER", "  ")]).unwrap();
        assert!(config.nats_user.is_none());
    }
}
