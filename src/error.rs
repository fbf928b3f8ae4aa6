#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data shape error: {0}")]
    DataShape(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
