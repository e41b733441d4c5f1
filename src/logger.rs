use crate::types::{First, Next};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Tracing hooks around a loop's initiation and update calls.
/// Every method is a no-op by default.
pub trait LoopLogger<M, E, F>: Send + Sync {
    fn will_initiate(&self, _model: &M) {}
    fn did_initiate(&self, _model: &M, _first: &First<M, F>) {}
    fn will_update(&self, _model: &M, _event: &E) {}
    fn did_update(&self, _model: &M, _event: &E, _next: &Next<M, F>) {}
}

/// The default logger: logs nothing.
pub struct NoopLogger;

impl<M, E, F> LoopLogger<M, E, F> for NoopLogger {}

/// Logger that emits every hook at debug level via `tracing`.
pub struct TracingLogger;

impl<M: Debug, E: Debug, F: Debug> LoopLogger<M, E, F> for TracingLogger {
    fn will_initiate(&self, model: &M) {
        tracing::debug!("[EventLoop] initiating from {model:?}");
    }

    fn did_initiate(&self, _model: &M, first: &First<M, F>) {
        tracing::debug!(
            "[EventLoop] initiated with {:?}, {} effect(s)",
            first.model,
            first.effects.len()
        );
    }

    fn will_update(&self, model: &M, event: &E) {
        tracing::debug!("[EventLoop] applying {event:?} to {model:?}");
    }

    fn did_update(&self, _model: &M, event: &E, next: &Next<M, F>) {
        tracing::debug!(
            "[EventLoop] {event:?} produced model {:?}, {} effect(s)",
            next.model(),
            next.effects().len()
        );
    }
}

/// Rotation cadence of a [`FileSink`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "minutely" => Some(Self::Minutely),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Rolling-file destination for host logs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileSink {
    pub dir: PathBuf,
    #[serde(default = "FileSink::default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Rotated files to keep before the oldest is deleted.
    #[serde(default = "FileSink::default_keep")]
    pub keep: usize,
}

impl FileSink {
    fn default_prefix() -> String {
        "helixrt".to_string()
    }

    fn default_keep() -> usize {
        3
    }
}

/// Host-process logging setup for binaries embedding a loop.
/// Logs go to stdout unless a [`FileSink`] is configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggerConfig {
    #[serde(default = "LoggerConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<FileSink>,
}

impl LoggerConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    /// Build a config from HELIX_LOG (level), HELIX_LOG_DIR and
    /// HELIX_LOG_ROTATION. A set HELIX_LOG_DIR selects file logging;
    /// everything else defaults.
    pub fn from_env() -> Self {
        let file = std::env::var("HELIX_LOG_DIR").ok().map(|dir| FileSink {
            dir: dir.into(),
            prefix: FileSink::default_prefix(),
            rotation: std::env::var("HELIX_LOG_ROTATION")
                .ok()
                .and_then(|v| LogRotation::parse(&v))
                .unwrap_or_default(),
            keep: FileSink::default_keep(),
        });
        Self {
            level: std::env::var("HELIX_LOG").unwrap_or_else(|_| Self::default_level()),
            file,
        }
    }

    /// Install the global tracing subscriber. Safe to call more than once;
    /// later calls leave the installed subscriber alone. Returns the
    /// appender guard when logging to files; keep it alive for the process
    /// lifetime.
    pub fn init(&self) -> anyhow::Result<Option<WorkerGuard>> {
        let level = Level::from_str(&self.level).unwrap_or(Level::INFO);

        let Some(sink) = &self.file else {
            let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
            return Ok(None);
        };

        let appender: RollingFileAppender = RollingFileAppender::builder()
            .rotation(sink.rotation.into())
            .max_log_files(sink.keep.max(1))
            .filename_prefix(sink.prefix.as_str())
            .build(&sink.dir)
            .with_context(|| format!("cannot open log sink in {}", sink.dir.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(writer)
            .with_ansi(false)
            .try_init();
        Ok(Some(guard))
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_parses_known_cadences_only() {
        assert_eq!(LogRotation::parse("hourly"), Some(LogRotation::Hourly));
        assert_eq!(LogRotation::parse("minutely"), Some(LogRotation::Minutely));
        assert_eq!(LogRotation::parse("daily"), Some(LogRotation::Daily));
        assert_eq!(LogRotation::parse("weekly"), None);
    }

    #[test]
    fn stdout_config_initialises_without_a_guard() {
        let config = LoggerConfig::default();
        assert!(config.file.is_none());
        let guard = config.init().expect("stdout init cannot fail");
        assert!(guard.is_none());
    }
}
