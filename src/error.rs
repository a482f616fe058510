use linfa_preprocessing::PreprocessingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Malformed numeric field `{field}`: {value:?}")]
    MalformedNumeric { field: &'static str, value: String },

    #[error("Contract source error for `{target}`: {reason}")]
    Source { target: String, reason: String },

    #[error("TF-IDF error: {0}")]
    Preprocessing(#[from] PreprocessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ChainError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
