use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("mismatch: {0}")]
    Mismatch(String),
}

pub type TrajResult<T> = Result<T, TrajError>;

impl TrajError {
    /// Parse error located at `path:line`.
    pub fn parse_at(path: &str, line: usize, msg: impl std::fmt::Display) -> Self {
        TrajError::Parse(format!("{path}:{line}: {msg}"))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, TrajError::Invalid(_))
    }
}
