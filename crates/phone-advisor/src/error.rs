//! Error Types for Phone Advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid search: {0}")]
    InvalidSearch(String),

    #[error("Catalog file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
