//! Error taxonomy for the analysis core.
//!
//! Only structural failures live here. Scientific-quality problems (low SNR,
//! too few peaks, nothing matched) are reported as
//! [`AnalysisWarning`](crate::pipeline::analysis::AnalysisWarning)s on the
//! result instead.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The path does not match any layout we know how to read.
    #[error("unreadable format: {0}")]
    UnreadableFormat(String),
    /// A recognized container could not be parsed.
    #[error("corrupt data: {0}")]
    CorruptData(String),
    /// Invalid tolerance, threshold or other analysis setting.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        AnalysisError::CorruptData(msg.into())
    }

    pub fn unreadable(msg: impl Into<String>) -> Self {
        AnalysisError::UnreadableFormat(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AnalysisError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
