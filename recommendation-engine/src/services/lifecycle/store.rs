//! On-disk persistence of the model artifact.
//!
//! The artifact is one serde_json blob (explicit schema, see
//! [`crate::models::ModelArtifact`]) so it can be loaded by tooling that
//! never ran the training pipeline. Saves go through a temp file and an
//! atomic rename; a reader either sees the previous artifact or the new
//! one, never a partial write.

use crate::error::{EngineError, Result};
use crate::models::ModelArtifact;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<ModelArtifact> {
        if !self.path.exists() {
            return Err(EngineError::ModelNotFound(self.path.display().to_string()));
        }

        let raw = fs::read_to_string(&self.path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;

        info!(
            version = %artifact.metadata.version,
            products = artifact.metadata.n_products,
            users = artifact.metadata.n_users,
            "Loaded model artifact"
        );

        Ok(artifact)
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(artifact)?)?;
        fs::rename(&tmp, &self.path)?;

        info!(
            version = %artifact.metadata.version,
            path = %self.path.display(),
            "Saved model artifact"
        );

        Ok(())
    }
}
