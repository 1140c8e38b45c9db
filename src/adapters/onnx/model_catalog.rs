use std::path::Path;
use std::sync::Arc;

use crate::adapters::onnx::yolo_engine::OnnxYoloEngine;
use crate::application::ports::{DetectorLoaderPort, LoadedDetector};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelConfiguration;

/// Builds [`OnnxYoloEngine`]s from the `model_path` of a configuration.
pub struct OnnxModelLoader {
    input_size: u32,
    intra_threads: usize,
}

impl OnnxModelLoader {
    pub fn new(input_size: u32, intra_threads: usize) -> Self {
        Self { input_size, intra_threads }
    }
}

/// Rejects blank paths and paths that do not point at a file.
pub fn validate_model_path(model: &ModelConfiguration) -> DomainResult<()> {
    if model.model_path.trim().is_empty() {
        return Err(DomainError::ModelLoadFailed("model_path empty".into()));
    }
    if !Path::new(&model.model_path).is_file() {
        return Err(DomainError::ModelNotFound {
            model: model.model_path.clone(),
            requested: false,
        });
    }
    Ok(())
}

impl DetectorLoaderPort for OnnxModelLoader {
    fn load(&self, config: &ModelConfiguration) -> DomainResult<LoadedDetector> {
        validate_model_path(config)?;
        let engine = OnnxYoloEngine::load(&config.model_path, self.input_size, self.intra_threads)
            .map_err(|e| DomainError::ModelLoadFailed(format!("{}: {e}", config.model_path)))?;
        let device = engine.device().to_string();
        Ok(LoadedDetector { detector: Arc::new(engine), device })
    }
}
