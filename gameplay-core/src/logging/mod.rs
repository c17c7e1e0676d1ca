//! Structured logging via `tracing`.
//!
//! `init_tracing` is idempotent; the first call wins. `RUST_LOG`, when set,
//! overrides the configured filter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

use crate::error::{GameplayError, GameplayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Filter and formatting for the process-wide subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub level: LogLevel,
    /// Per-target overrides, e.g. `gameplay_core::buffs = debug`
    pub targets: BTreeMap<String, LogLevel>,
    pub show_targets: bool,
    pub show_thread_ids: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            targets: BTreeMap::new(),
            show_targets: true,
            show_thread_ids: false,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.targets.insert(target.into(), level);
        self
    }

    /// `EnvFilter` directives: the default level, then one per target
    pub fn directives(&self) -> String {
        std::iter::once(self.level.as_str().to_string())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={}", level.as_str())),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn from_json(json: &str) -> GameplayResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GameplayError::Configuration(format!("invalid tracing config: {e}")))
    }
}

static TRACING_INIT: Once = Once::new();

pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Install the global subscriber once. Later calls are ignored.
pub fn init_tracing(config: &TracingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.directives()));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact()
            .try_init();
        // another subscriber may already own the global slot
        if installed.is_ok() {
            tracing::debug!(directives = %config.directives(), "Tracing initialized");
        }
    });
}

/// Span guard around one simulation step
pub struct TickSpan {
    _span: tracing::span::EnteredSpan,
}

impl TickSpan {
    pub fn new(tick: u64) -> Self {
        let span = tracing::debug_span!("tick", tick);
        Self {
            _span: span.entered(),
        }
    }
}
