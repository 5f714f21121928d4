//! Refresh tunables (layered: defaults < TOML file < env).

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Observer for the refresher's diagnostic messages.
///
/// Purely observational: installing or removing a sink never changes
/// refresh behaviour.
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

const ENV_LEAD_TIME_MS: &str = "RENEWAL_LEAD_TIME_MS";
const ENV_JITTER_MS: &str = "RENEWAL_JITTER_MS";
const ENV_IMMEDIATE_THRESHOLD_MS: &str = "RENEWAL_IMMEDIATE_THRESHOLD_MS";
const ENV_WALL_CLOCK_TICK_MS: &str = "RENEWAL_WALL_CLOCK_TICK_MS";

/// Errors raised while loading [`RefreshConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Timing policy for proactive refresh.
///
/// # Example
/// ```
/// use renewal::config::RefreshConfig;
///
/// let config = RefreshConfig::from_toml_str("lead_time_ms = 60000").unwrap();
/// assert_eq!(config.lead_time().as_secs(), 60);
/// assert_eq!(config.jitter_ms, 30_000);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    /// How long before expiry a refresh should happen.
    pub lead_time_ms: u64,
    /// Total width of the jitter window, centred on zero.
    pub jitter_ms: u64,
    /// Delays below this run the refresh right away instead of arming a timer.
    pub immediate_threshold_ms: u64,
    /// Longest single sleep of a wall-clock timer before it re-reads the clock.
    pub wall_clock_tick_ms: u64,
    #[serde(skip)]
    debug_sink: Option<DebugSink>,
}

impl fmt::Debug for RefreshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshConfig")
            .field("lead_time_ms", &self.lead_time_ms)
            .field("jitter_ms", &self.jitter_ms)
            .field("immediate_threshold_ms", &self.immediate_threshold_ms)
            .field("wall_clock_tick_ms", &self.wall_clock_tick_ms)
            .field("debug_sink", &self.debug_sink.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            lead_time_ms: 30_000,
            jitter_ms: 30_000,
            immediate_threshold_ms: 1_000,
            wall_clock_tick_ms: 1_000,
            debug_sink: None,
        }
    }
}

impl RefreshConfig {
    /// Defaults overridden by `RENEWAL_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Full layering: defaults, then the file (when given and present), then env.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        let _ = dotenvy::dotenv();
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value lookup (env vars in production).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let fields: [(&str, &mut u64); 4] = [
            (ENV_LEAD_TIME_MS, &mut self.lead_time_ms),
            (ENV_JITTER_MS, &mut self.jitter_ms),
            (ENV_IMMEDIATE_THRESHOLD_MS, &mut self.immediate_threshold_ms),
            (ENV_WALL_CLOCK_TICK_MS, &mut self.wall_clock_tick_ms),
        ];
        for (key, slot) in fields {
            if let Some(raw) = lookup(key) {
                *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw.clone(),
                })?;
            }
        }
        self.validate()
    }

    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn lead_time(&self) -> Duration {
        Duration::from_millis(self.lead_time_ms)
    }

    pub fn immediate_threshold(&self) -> Duration {
        Duration::from_millis(self.immediate_threshold_ms)
    }

    pub fn wall_clock_tick(&self) -> Duration {
        Duration::from_millis(self.wall_clock_tick_ms)
    }

    /// Emit a diagnostic through `tracing` and the debug sink, if any.
    pub fn debug(&self, message: impl fmt::Display) {
        let message = message.to_string();
        tracing::debug!(target: "renewal", "{message}");
        if let Some(sink) = &self.debug_sink {
            sink(&message);
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.wall_clock_tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "wall_clock_tick_ms".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}
