use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::WatchError;
use crate::types::Target;

/// Knobs for one reveal pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealTunables {
    /// Absolute cap on rounds. Guarantees termination.
    pub max_rounds: u32,
    /// Consecutive no-progress rounds before the pass is declared stalled.
    pub no_progress_threshold: u32,
    /// Consecutive hard-bottom observations before the pass stops.
    pub bottom_stable_checks: u32,
    /// Extra same-kind clicks allowed after a click with confirmed effect.
    pub bonus_clicks: u32,
    /// Post-convergence sweep passes for nested replies. 0 disables sweeping.
    pub sweep_passes: u32,
    /// Upper bound on scroll steps within one sweep pass.
    pub sweep_max_steps: u32,
    pub effect_timeout: Duration,
    pub settle_delay: Duration,
    /// Passive scroll distance in px.
    pub scroll_step: f64,
    /// Scroll distance used after an action timed out.
    pub nudge: f64,
}

impl Default for RevealTunables {
    fn default() -> Self {
        Self {
            max_rounds: 60,
            no_progress_threshold: 4,
            bottom_stable_checks: 3,
            bonus_clicks: 2,
            sweep_passes: 2,
            sweep_max_steps: 40,
            effect_timeout: Duration::from_millis(2500),
            settle_delay: Duration::from_millis(400),
            scroll_step: 600.0,
            nudge: 120.0,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Inputs & state
    pub targets_path: PathBuf,
    pub state_path: PathBuf,
    pub patterns_path: Option<PathBuf>,

    // Browser driver sidecar
    pub driver_url: String,
    pub driver_token: Option<String>,

    // Notifications
    pub webhook_url: Option<String>,

    // Polling
    pub poll_interval: Duration,
    pub driver_retries: u32,
    pub alert_after_failures: u32,

    pub reveal: RevealTunables,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing or malformed.
    pub fn from_env() -> Self {
        let defaults = RevealTunables::default();
        Self {
            targets_path: PathBuf::from(required_env("THREADWATCH_TARGETS_PATH")),
            state_path: PathBuf::from(
                env::var("THREADWATCH_STATE_PATH")
                    .unwrap_or_else(|_| "threadwatch-state.json".to_string()),
            ),
            patterns_path: optional_env("THREADWATCH_PATTERNS_PATH").map(PathBuf::from),
            driver_url: required_env("THREADWATCH_DRIVER_URL"),
            driver_token: optional_env("THREADWATCH_DRIVER_TOKEN"),
            webhook_url: optional_env("THREADWATCH_WEBHOOK_URL"),
            poll_interval: Duration::from_secs(parsed_env("POLL_INTERVAL_SECS", 300)),
            driver_retries: parsed_env("DRIVER_RETRIES", 3),
            alert_after_failures: parsed_env("ALERT_AFTER_FAILURES", 3),
            reveal: RevealTunables {
                max_rounds: parsed_env("MAX_ROUNDS", defaults.max_rounds),
                no_progress_threshold: parsed_env(
                    "NO_PROGRESS_THRESHOLD",
                    defaults.no_progress_threshold,
                ),
                bottom_stable_checks: parsed_env(
                    "BOTTOM_STABLE_CHECKS",
                    defaults.bottom_stable_checks,
                ),
                bonus_clicks: parsed_env("BONUS_CLICKS", defaults.bonus_clicks),
                sweep_passes: parsed_env("SWEEP_PASSES", defaults.sweep_passes),
                effect_timeout: Duration::from_millis(parsed_env("EFFECT_TIMEOUT_MS", 2500)),
                settle_delay: Duration::from_millis(parsed_env("SETTLE_MS", 400)),
                ..defaults
            },
        }
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            targets_path = %self.targets_path.display(),
            state_path = %self.state_path.display(),
            driver_url = self.driver_url.as_str(),
            driver_token = if self.driver_token.is_some() { "[set]" } else { "[unset]" },
            webhook = if self.webhook_url.is_some() { "[set]" } else { "[unset]" },
            poll_interval_secs = self.poll_interval.as_secs(),
            max_rounds = self.reveal.max_rounds,
            no_progress_threshold = self.reveal.no_progress_threshold,
            sweep_passes = self.reveal.sweep_passes,
            "Configuration loaded"
        );
    }

    pub fn load_targets(&self) -> Result<Vec<Target>, WatchError> {
        load_targets(&self.targets_path)
    }
}

/// Read and validate the target list. Ids must be unique and non-empty.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, WatchError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| WatchError::Config(format!("reading {}: {e}", path.display())))?;
    let targets: Vec<Target> = serde_json::from_str(&raw)
        .map_err(|e| WatchError::Config(format!("parsing {}: {e}", path.display())))?;

    let mut seen = HashSet::new();
    for target in &targets {
        if target.id.trim().is_empty() {
            return Err(WatchError::Config("target with empty id".to_string()));
        }
        if target.location_ref.trim().is_empty() {
            return Err(WatchError::Config(format!(
                "target {} has no location",
                target.id
            )));
        }
        if !seen.insert(target.id.as_str()) {
            return Err(WatchError::Config(format!(
                "duplicate target id {}",
                target.id
            )));
        }
    }
    Ok(targets)
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
