//! Error types for officebatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    /// Malformed directive or unbalanced block. Fatal before execution.
    #[error("Parse error (line {line}): {message}")]
    Parse { line: usize, message: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Variable error: {0}")]
    Variable(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BatchError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        BatchError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Line number for errors tied to a script location
    pub fn line(&self) -> Option<usize> {
        match self {
            BatchError::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
