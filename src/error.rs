use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeriesVizError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type SeriesVizResult<T> = Result<T, SeriesVizError>;
