//! Conflict resolution between a local record and a diverging remote version.

use serde_json::Value;

use crate::record::Record;

/// Resolves a version conflict into a single document.
///
/// Any `Fn(&Record, &Value, i64) -> Result<Value, MergeError>` is a strategy.
pub trait MergeStrategy: Send + Sync {
    fn merge(&self, record: &Record, remote: &Value, remote_version: i64) -> Result<Value, MergeError>;
}

impl<F> MergeStrategy for F
where
    F: Fn(&Record, &Value, i64) -> Result<Value, MergeError> + Send + Sync,
{
    fn merge(&self, record: &Record, remote: &Value, remote_version: i64) -> Result<Value, MergeError> {
        self(record, remote, remote_version)
    }
}

/// The remote document replaces the local one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteWins;

impl MergeStrategy for RemoteWins {
    fn merge(&self, _record: &Record, remote: &Value, _remote_version: i64) -> Result<Value, MergeError> {
        Ok(remote.clone())
    }
}

/// The local document is kept and re-sent on top of the remote version.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWins;

impl MergeStrategy for LocalWins {
    fn merge(&self, record: &Record, _remote: &Value, _remote_version: i64) -> Result<Value, MergeError> {
        Ok(record.get())
    }
}

/// A strategy could not produce a merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeError {
    pub message: String,
}

impl MergeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Merge failed: {}", self.message)
    }
}

impl std::error::Error for MergeError {}
