use std::env;
use std::path::Path;

use mediaplat_topology::TopologyConfig;
use mediaplat_workqueue::SchedulerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Platform configuration: scheduler and topology settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

impl PlatformConfig {
    /// Parse a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MEDIAPLAT_PROFILE`. When set (e.g. `TEST`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MEDIAPLAT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let defaults = SchedulerConfig::default();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig {
                worker_threads: profiled_env_usize(p, "MEDIAPLAT_WORKER_THREADS", defaults.worker_threads),
                thread_name_prefix: profiled_env_or(p, "MEDIAPLAT_THREAD_NAME_PREFIX", &defaults.thread_name_prefix),
                max_private_queues: profiled_env_usize(p, "MEDIAPLAT_MAX_PRIVATE_QUEUES", defaults.max_private_queues),
                repeat_cancel_succeeds: profiled_env_bool(p, "MEDIAPLAT_REPEAT_CANCEL_SUCCEEDS", defaults.repeat_cancel_succeeds),
                legacy_serial_restrictions: profiled_env_bool(p, "MEDIAPLAT_LEGACY_SERIAL_RESTRICTIONS", defaults.legacy_serial_restrictions),
            },
            topology: TopologyConfig {
                output_collections: profiled_env_bool(p, "MEDIAPLAT_OUTPUT_COLLECTIONS", TopologyConfig::default().output_collections),
            },
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   workers={}, max_private_queues={}",
            self.scheduler.resolved_worker_threads(),
            self.scheduler.resolved_max_private_queues()
        );
        tracing::info!(
            "  policies:    repeat_cancel_succeeds={}, legacy_serial_restrictions={}",
            self.scheduler.repeat_cancel_succeeds,
            self.scheduler.legacy_serial_restrictions
        );
        tracing::info!("  topology:    output_collections={}", self.topology.output_collections);
    }

    /// Return a JSON view of the effective settings.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "scheduler": {
                "worker_threads": self.scheduler.resolved_worker_threads(),
                "thread_name_prefix": self.scheduler.thread_name_prefix,
                "max_private_queues": self.scheduler.resolved_max_private_queues(),
                "repeat_cancel_succeeds": self.scheduler.repeat_cancel_succeeds,
                "legacy_serial_restrictions": self.scheduler.legacy_serial_restrictions,
            },
            "topology": { "output_collections": self.topology.output_collections },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_takes_defaults() {
        let config = PlatformConfig::from_toml_str("").unwrap();
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.scheduler.worker_threads, 0);
        assert!(config.topology.output_collections);
    }

    #[test]
    fn toml_sections() {
        let config = PlatformConfig::from_toml_str(
            r#"
            [scheduler]
            worker_threads = 3
            legacy_serial_restrictions = true

            [topology]
            output_collections = false
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.worker_threads, 3);
        assert!(config.scheduler.legacy_serial_restrictions);
        assert!(!config.scheduler.repeat_cancel_succeeds);
        assert!(!config.topology.output_collections);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = PlatformConfig::from_toml_str("[scheduler]\nworker_threads = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PlatformConfig::from_file("/nonexistent/mediaplat.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn profiled_env_overrides() {
        // Profile-prefixed keys only; nothing else reads these names.
        env::set_var("CFGTEST_MEDIAPLAT_WORKER_THREADS", "6");
        env::set_var("CFGTEST_MEDIAPLAT_REPEAT_CANCEL_SUCCEEDS", "true");
        env::set_var("CFGTEST_MEDIAPLAT_OUTPUT_COLLECTIONS", "0");

        let config = PlatformConfig::for_profile("cfgtest");
        assert_eq!(config.profile_label(), "CFGTEST");
        assert_eq!(config.scheduler.worker_threads, 6);
        assert!(config.scheduler.repeat_cancel_succeeds);
        assert!(!config.topology.output_collections);

        env::remove_var("CFGTEST_MEDIAPLAT_WORKER_THREADS");
        env::remove_var("CFGTEST_MEDIAPLAT_REPEAT_CANCEL_SUCCEEDS");
        env::remove_var("CFGTEST_MEDIAPLAT_OUTPUT_COLLECTIONS");
    }

    #[test]
    fn summary_reports_resolved_values() {
        let config = PlatformConfig::default();
        let summary = config.summary();
        assert_eq!(summary["profile"], "default");
        assert!(summary["scheduler"]["worker_threads"].as_u64().unwrap() > 0);
        assert_eq!(summary["topology"]["output_collections"], true);
    }
}
