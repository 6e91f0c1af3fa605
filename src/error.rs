use std::path::PathBuf;
use thiserror::Error;

/// fwunpack's custom error types for better error handling and user experience.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("required tool '{tool}' is not available")]
    PrerequisiteMissing { tool: String },

    #[error("tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("invalid path: {path} - {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

pub type Result<T> = std::result::Result<T, UnpackError>;

impl UnpackError {
    pub fn prerequisite_missing<S: Into<String>>(tool: S) -> Self {
        Self::PrerequisiteMissing { tool: tool.into() }
    }

    pub fn tool_invocation<S1: Into<String>, S2: Into<String>>(tool: S1, message: S2) -> Self {
        Self::ToolInvocation { tool: tool.into(), message: message.into() }
    }

    pub fn extraction<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Extraction { path: path.into(), message: message.into() }
    }

    pub fn invalid_path<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::InvalidPath { path: path.into(), reason: reason.into() }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Returns true if the error is scoped to a single file and the run can continue.
    /// Only a missing startup prerequisite aborts a run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::PrerequisiteMissing { .. })
    }
}
