///! Logging initialisation
///! Console output plus an optional JSON file sink with rotation

use crate::config::LoggingConfig;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn parse(value: &str) -> Result<Self, LoggingError> {
        match value {
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            other => Err(LoggingError::InvalidRotation(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log rotation '{0}'")]
    InvalidRotation(String),
    #[error("failed to create log directory {0:?}: {1}")]
    LogDir(std::path::PathBuf, io::Error),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

impl LoggingConfig {
    /// Install the global subscriber
    ///
    /// The returned guard flushes the file sink on drop and must be held for
    /// the life of the process.
    pub fn init(&self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let console_layer = if self.json {
            fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_writer(io::stderr)
                .boxed()
        };

        let (file_layer, guard) = if self.file_logging_enabled {
            let rotation = LogRotation::parse(&self.rotation)?;
            std::fs::create_dir_all(&self.log_dir)
                .map_err(|e| LoggingError::LogDir(self.log_dir.clone(), e))?;

            let file_name = format!("{}.log", self.file_prefix);
            let file_appender = match rotation {
                LogRotation::Hourly => rolling::hourly(&self.log_dir, file_name),
                LogRotation::Daily => rolling::daily(&self.log_dir, file_name),
                LogRotation::Never => rolling::never(&self.log_dir, file_name),
            };

            let (writer, guard) = non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!(level = %self.level, file = self.file_logging_enabled, "Logging initialized");

        Ok(guard)
    }
}

/// Log a lifecycle operation event with its cluster
#[macro_export]
macro_rules! log_operation {
    ($level:ident, $op:expr, $cluster:expr, $msg:expr) => {
        tracing::$level!(operation = $op, cluster = $cluster, $msg)
    };
    ($level:ident, $op:expr, $cluster:expr, $msg:expr, $($key:ident = $value:expr),+) => {
        tracing::$level!(operation = $op, cluster = $cluster, $($key = $value),+, $msg)
    };
}
