use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid day key '{0}' (expected YYYY-MM-DD)")]
    InvalidDayKey(String),
}
