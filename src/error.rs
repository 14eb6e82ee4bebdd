//! Systemic failures of a conversion run
//!
//! Defects of single buildings are no errors, see `defects.rs`.

use thiserror::Error;

/// Conversion result type
pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The source returned no elements at all. Not the same as "no buildings in this tile".
    #[error("the data source returned an empty dataset")]
    EmptyDataset,

    #[error("request to the data source failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the data source answered with status {0}")]
    HttpStatus(u16),

    #[error("invalid JSON from the data source: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request '{0}'")]
    InvalidTilePath(String),
}
