use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] tunedl_engine::PipelineError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("{failed} of {total} items failed")]
    ItemsFailed { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, AppError>;
