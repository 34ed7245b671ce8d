//! Structured stage logging on top of [`shared_logging::JsonLogger`].

use std::{path::Path, sync::Arc};

use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord};

/// Shared logger tagged with the emitting stage.
#[derive(Debug, Clone)]
pub struct PipelineTelemetry {
    logger: Arc<JsonLogger>,
    module: String,
}

impl PipelineTelemetry {
    /// Wraps an existing logger.
    #[must_use]
    pub fn new(logger: Arc<JsonLogger>, module: impl Into<String>) -> Self {
        Self {
            logger,
            module: module.into(),
        }
    }

    /// Opens a run-stamped log file in `dir`.
    pub fn for_run(dir: impl AsRef<Path>, module: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(JsonLogger::for_run(dir)?), module))
    }

    /// Same log file, different module tag.
    #[must_use]
    pub fn scoped(&self, module: impl Into<String>) -> Self {
        Self::new(Arc::clone(&self.logger), module)
    }

    /// Writes one record. A failed write goes to stderr and never aborts the caller.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        let record = LogRecord::new(self.module.as_str(), level, message).with_metadata(metadata);
        if let Err(err) = self.logger.log(&record) {
            eprintln!("telemetry write failed: {err:?}");
        }
    }

    /// Informational record.
    pub fn info(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Info, message, metadata);
    }

    /// Warning record.
    pub fn warn(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Warn, message, metadata);
    }

    /// Error record.
    pub fn error(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Error, message, metadata);
    }

    /// Underlying logger.
    #[must_use]
    pub fn logger(&self) -> &JsonLogger {
        &self.logger
    }
}

/// Logs through `telemetry` when one is attached.
pub(crate) fn record(
    telemetry: Option<&PipelineTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: impl FnOnce() -> Value,
) {
    if let Some(telemetry) = telemetry {
        telemetry.log(level, message, metadata());
    }
}
