use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccrualError>;

#[derive(Error, Debug)]
pub enum AccrualError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Accrual request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Accrual service answered with unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    #[error("Failed to decode accrual response: {0}")]
    Decode(String),
    #[error("Accrual service reported unknown status {0:?}")]
    UnknownStatus(String),
    #[error("Order {0} already exists")]
    DuplicateOrder(String),
    #[error("Order {0} not found")]
    OrderNotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for AccrualError {
    fn from(e: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(e))
    }
}

impl AccrualError {
    /// Whether a later sweep may succeed where this attempt failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::UnexpectedStatus(_) | Self::Decode(_) | Self::IoError(_)
        )
    }
}
