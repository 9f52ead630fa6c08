use thiserror::Error;

/// Everything that can go wrong between picking a file and getting an
/// `AnalysisResult` back.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table error: {0}")]
    Polars(#[from] polars::error::PolarsError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Column not found: {0}")]
    MissingColumn(String),
    #[error("Column '{column}' has {found} numeric value(s), at least 2 are required")]
    InsufficientData { column: String, found: usize },
    #[error("Division by zero: {0}")]
    DivisionByZero(&'static str),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid metrics: {0}")]
    InvalidMetrics(String),
    #[error("Background task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
