use thiserror::Error;

/// Everything that can end a prediction request.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("No file part")]
    NoFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("File too large")]
    PayloadTooLarge(axum::extract::multipart::MultipartError),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("Nutrition info not found")]
    NutritionNotFound,

    #[error("nutrition repository unavailable: {0}")]
    RepositoryUnavailable(#[from] sqlx::Error),

    #[error("prediction task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// How a failure is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NotFound,
    Internal,
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::NoFilePart
            | PredictionError::NoSelectedFile
            | PredictionError::PayloadTooLarge(_) => ErrorKind::Input,
            PredictionError::NutritionNotFound => ErrorKind::NotFound,
            PredictionError::InvalidImage(_)
            | PredictionError::ModelInference(_)
            | PredictionError::RepositoryUnavailable(_)
            | PredictionError::TaskFailed(_) => ErrorKind::Internal,
        }
    }
}
