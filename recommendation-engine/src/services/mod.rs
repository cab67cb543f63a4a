pub mod interaction;
pub mod lifecycle;
pub mod scoring;
pub mod similarity;
pub mod source;

pub use interaction::InteractionMatrixBuilder;
pub use lifecycle::{ModelLifecycleManager, PipelineState, TrainingReport};
pub use scoring::{ContentHandle, CurrentModel, RecommendationScorer};
pub use similarity::{CoOccurrenceFilter, SimilarityEngine};
pub use source::{ContentModelProvider, InMemorySource, InteractionSource, JsonFileSource};
