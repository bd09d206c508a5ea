use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
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

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub host: HostConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TICKWORK_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TICKWORK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig::from_env_profiled(p),
            host: HostConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   max_idle_wait_ms={}, thread_name={}",
            self.scheduler.max_idle_wait_ms,
            self.scheduler.thread_name
        );
        tracing::info!("  host:        tick_rate_hz={}", self.host.tick_rate_hz);
    }

    /// Return the loaded values as JSON.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "scheduler": {
                "max_idle_wait_ms": self.scheduler.max_idle_wait_ms,
                "thread_name": self.scheduler.thread_name,
            },
            "host": { "tick_rate_hz": self.host.tick_rate_hz },
        })
    }
}

// ── Wall-clock scheduler ──────────────────────────────────────

/// Settings for the wall-clock dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on a single idle wait, used when no task is pending.
    #[serde(default = "default_max_idle_wait_ms")]
    pub max_idle_wait_ms: u64,
    /// Name given to the dispatch thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_max_idle_wait_ms() -> u64 { 60_000 }
fn default_thread_name() -> String { "tickwork-wall-clock".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_idle_wait_ms: default_max_idle_wait_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_idle_wait_ms: profiled_env_u64(
                p,
                "SCHEDULER_MAX_IDLE_WAIT_MS",
                default_max_idle_wait_ms(),
            ),
            thread_name: profiled_env_or(p, "SCHEDULER_THREAD_NAME", &default_thread_name()),
        }
    }
}

// ── Host simulation ───────────────────────────────────────────

/// Settings for the emulated host simulation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Simulation steps per second.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
}

fn default_tick_rate_hz() -> u32 { 20 }

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
        }
    }
}

impl HostConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_rate_hz: profiled_env_u32(p, "HOST_TICK_RATE_HZ", default_tick_rate_hz()),
        }
    }

    /// Length of one simulation step in milliseconds (at least 1).
    pub fn tick_interval_ms(&self) -> u64 {
        (1000 / u64::from(self.tick_rate_hz.max(1))).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.scheduler.max_idle_wait_ms, 60_000);
        assert_eq!(config.scheduler.thread_name, "tickwork-wall-clock");
        assert_eq!(config.host.tick_rate_hz, 20);
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"scheduler": {"max_idle_wait_ms": 250}}"#).unwrap();
        assert_eq!(config.scheduler.max_idle_wait_ms, 250);
        assert_eq!(config.scheduler.thread_name, "tickwork-wall-clock");
    }

    #[test]
    fn profile_prefixed_key_wins() {
        // Unique profile name so parallel tests don't collide.
        env::set_var("CFGTEST_HOST_TICK_RATE_HZ", "40");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile, "CFGTEST");
        assert_eq!(config.host.tick_rate_hz, 40);
        env::remove_var("CFGTEST_HOST_TICK_RATE_HZ");
    }

    #[test]
    fn tick_interval_never_zero() {
        let host = HostConfig { tick_rate_hz: 0 };
        assert_eq!(host.tick_interval_ms(), 1000);
        let host = HostConfig { tick_rate_hz: 5000 };
        assert_eq!(host.tick_interval_ms(), 1);
        assert_eq!(HostConfig::default().tick_interval_ms(), 50);
    }

    #[test]
    fn summary_reports_profile_label() {
        let config = Config::default();
        let summary = config.summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["host"]["tick_rate_hz"], 20);
    }
}
