use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskReviewError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Input error: {0}")]
    Input(String),

    #[cfg(feature = "pdf")]
    #[error("Unknown district: {0}")]
    UnknownDistrict(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for DeskReviewError {
    fn from(e: serde_json::Error) -> Self {
        Self::Settings(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeskReviewError>;
