pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, Result};
pub use models::{
    ModelArtifact, ModelMetadata, RecommendationCandidate, RecommendationKind, TrainingMode,
};
pub use services::{
    ContentHandle, CurrentModel, ModelLifecycleManager, RecommendationScorer,
};
