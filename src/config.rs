//! Configuration types — loaded once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Which summarizer backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryBackendKind {
    /// Deterministic, dependency-free truncation of the canonical text.
    Heuristic,
    /// External model endpoint; falls back to heuristic on any failure.
    External,
}

/// Pipeline configuration.
///
/// Threaded explicitly through the orchestrator so every stage sees
/// deterministic, testable inputs. No hot-reload mid-batch.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on summary length in characters (ellipsis included).
    pub max_summary_len: usize,
    /// Extraction stops once this many action items are found.
    pub max_action_items: usize,
    /// Regex patterns for senders that force importance up.
    pub high_senders: Vec<String>,
    /// Regex patterns for bulk/automated senders.
    pub low_senders: Vec<String>,
    /// Summarizer backend selection.
    pub backend: SummaryBackendKind,
    /// External backend chat endpoint (Ollama-style).
    pub external_url: String,
    /// Model name passed to the external backend.
    pub external_model: String,
    /// Time budget for one external backend call.
    pub external_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_summary_len: 240,
            max_action_items: 5,
            high_senders: Vec::new(),
            low_senders: Vec::new(),
            backend: SummaryBackendKind::Heuristic,
            external_url: "http://localhost:11434/api/chat".to_string(),
            external_model: "llama3.2".to_string(),
            external_timeout: Duration::from_secs(15),
        }
    }
}

impl PipelineConfig {
    /// Build pipeline config from environment variables, with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_summary_len: env_parse("MAILMINDER_MAX_SUMMARY_LEN", defaults.max_summary_len),
            max_action_items: env_parse("MAILMINDER_MAX_ACTION_ITEMS", defaults.max_action_items),
            high_senders: env_list("MAILMINDER_HIGH_SENDERS"),
            low_senders: env_list("MAILMINDER_LOW_SENDERS"),
            backend: match std::env::var("MAILMINDER_SUMMARY_BACKEND").as_deref() {
                Ok("external") => SummaryBackendKind::External,
                _ => SummaryBackendKind::Heuristic,
            },
            external_url: std::env::var("MAILMINDER_EXTERNAL_URL")
                .unwrap_or(defaults.external_url),
            external_model: std::env::var("MAILMINDER_EXTERNAL_MODEL")
                .unwrap_or(defaults.external_model),
            external_timeout: Duration::from_secs(env_parse(
                "MAILMINDER_EXTERNAL_TIMEOUT_SECS",
                15,
            )),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Path to the local database file.
    pub db_path: PathBuf,
    /// Shared write credential; `None` disables the check (local dev).
    pub api_key: Option<SecretString>,
    /// Optional JSON fixture file for the ingestion source.
    pub fixture_path: Option<PathBuf>,
    /// Background poll interval in seconds; 0 disables the loop.
    pub poll_interval_secs: u64,
    /// Seed the demo mailbox on startup.
    pub seed_demo: bool,
}

impl ServerConfig {
    /// Build server config from environment variables, with defaults.
    pub fn from_env() -> Self {
        Self {
            port: env_parse("MAILMINDER_PORT", 8080),
            db_path: std::env::var("MAILMINDER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/mailminder.db")),
            api_key: std::env::var("MAILMINDER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            fixture_path: std::env::var("MAILMINDER_FIXTURE_PATH")
                .ok()
                .map(PathBuf::from),
            poll_interval_secs: env_parse("MAILMINDER_POLL_INTERVAL_SECS", 0),
            seed_demo: matches!(
                std::env::var("MAILMINDER_SEED").as_deref(),
                Ok("1") | Ok("true")
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_summary_len, 240);
        assert_eq!(config.max_action_items, 5);
        assert_eq!(config.backend, SummaryBackendKind::Heuristic);
        assert!(config.high_senders.is_empty());
    }
}
