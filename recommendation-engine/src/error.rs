use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model validation failed: {0}")]
    Validation(String),

    #[error("Candidate rejected by evaluation: {0}")]
    EvaluationRejected(String),

    #[error("Deployment failed: {0}")]
    DeployFailure(String),

    #[error("Rollback failed: {0}")]
    RollbackFailure(String),

    #[error("Training run exceeded wall-clock budget of {0}s")]
    Timeout(u64),

    #[error("Another training run is already in progress")]
    TrainingInProgress,

    #[error("Data access error: {0}")]
    DataAccess(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::DataAccess(err.to_string())
    }
}
