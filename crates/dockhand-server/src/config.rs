//! Environment-based configuration.

use std::path::PathBuf;

use tracing::warn;

use dockhand_core::defaults::{
    JOB_WORKER_COUNT, OCR_TIMEOUT_SECS, SERVER_PORT,
};
use dockhand_core::{Error, Result};

/// Fallback credential key for development setups. Loudly warned about.
const INSECURE_DEV_KEY: &str = "insecure-dev-key-do-not-use-in-production";

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub storage_root: PathBuf,
    pub placeholder_path: PathBuf,
    pub default_inbox_path: Option<PathBuf>,
    pub credential_key: String,
    pub ocr_input_dir: PathBuf,
    pub ocr_output_dir: PathBuf,
    pub ocr_timeout_secs: u64,
    pub worker_count: usize,
    pub ai_worker_count: usize,
}

impl Config {
    /// Load configuration from the environment. A missing `DATABASE_URL`
    /// is fatal; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("DATABASE_URL environment variable is required".into()))?;

        let storage_root = PathBuf::from(env_or("STORAGE_PATH", "data/storage"));

        let credential_key = match std::env::var("CREDENTIAL_ENCRYPTION_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                warn!("CREDENTIAL_ENCRYPTION_KEY not set - network source credentials will not be secure");
                INSECURE_DEV_KEY.to_string()
            }
        };

        let ocr_input_dir = std::env::var("OCR_INPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_root.join("ocr-input"));
        let ocr_output_dir = std::env::var("OCR_OUTPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_root.join("ocr-output"));

        Ok(Self {
            database_url,
            port: env_parsed("PORT", SERVER_PORT),
            placeholder_path: PathBuf::from(env_or(
                "PLACEHOLDER_PATH",
                "static/images/placeholder.webp",
            )),
            default_inbox_path: std::env::var("INBOX_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            credential_key,
            ocr_input_dir,
            ocr_output_dir,
            ocr_timeout_secs: env_parsed("OCR_TIMEOUT_SECS", OCR_TIMEOUT_SECS),
            worker_count: env_parsed("WORKER_COUNT", JOB_WORKER_COUNT),
            ai_worker_count: env_parsed("AI_WORKER_COUNT", 2),
            storage_root,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("DOCKHAND_TEST_UNSET_VAR", "fallback"), "fallback");
    }

    #[test]
    fn test_env_parsed_default() {
        assert_eq!(env_parsed::<u16>("DOCKHAND_TEST_UNSET_PORT", 3000), 3000);
    }
}
