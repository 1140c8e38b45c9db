use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    application::{
        detector_cache::DetectorCache,
        image_source::{ImageResolver, ImageSource},
        normalizer::normalize,
    },
    domain::{
        errors::{DomainError, DomainResult},
        model::{ModelConfiguration, ModelStatus, RawModelParams},
        result::DetectionResult,
        stats::aggregate,
    },
};

/// Flips to `true` when the caller gives up on a request.
pub type CancelSignal = watch::Receiver<bool>;

/// Orquestador de la detección: imagen de entrada, [`DetectionResult`] de salida.
///
/// No usa estado global; la caché de detectores se recibe desde fuera, así cada
/// instancia (y cada test) trabaja con su propia caché.
#[derive(Clone)]
pub struct DetectionService {
    resolver: ImageResolver,
    cache: Arc<DetectorCache>,
}

impl DetectionService {
    pub fn new(resolver: ImageResolver, cache: Arc<DetectorCache>) -> Self {
        Self { resolver, cache }
    }

    pub fn cache(&self) -> &Arc<DetectorCache> {
        &self.cache
    }

    pub async fn detect(&self, source: ImageSource, params: RawModelParams) -> DomainResult<DetectionResult> {
        // The sender is kept alive for the whole call so the signal never fires.
        let (_tx, cancel) = watch::channel(false);
        self.detect_until(source, params, &cancel).await
    }

    /// Runs one detection. Cancellation is honoured up to the moment inference
    /// starts; the detector itself is not interrupted. No step is retried.
    pub async fn detect_until(
        &self,
        source: ImageSource,
        params: RawModelParams,
        cancel: &CancelSignal,
    ) -> DomainResult<DetectionResult> {
        source.precheck()?;
        let config = params.validate_over(&self.cache.active_config()?)?;
        if *cancel.borrow() {
            return Err(DomainError::Cancelled);
        }
        let (image, image_info) = self.resolver.resolve(source).await?;

        if *cancel.borrow() {
            return Err(DomainError::Cancelled);
        }
        // Siempre el modelo activo ahora, aunque una recarga haya terminado durante la descarga.
        let cached = self.cache.acquire().await?;
        if *cancel.borrow() {
            return Err(DomainError::Cancelled);
        }
        let config = ModelConfiguration {
            model_name: cached.config().model_name.clone(),
            model_path: cached.config().model_path.clone(),
            ..config
        };

        let detector = cached.detector();
        let started = Instant::now();
        let (raw, config) = tokio::task::spawn_blocking(move || {
            detector.detect(image.rgb(), &config).map(|raw| (raw, config))
        })
        .await
        .map_err(|e| DomainError::InferenceFailed(format!("inference task failed: {e}")))?
        .map_err(|e| match e {
            e @ DomainError::InferenceFailed(_) => e,
            other => DomainError::InferenceFailed(other.to_string()),
        })?;

        let detections = normalize(&raw, &image_info, &config);
        let elapsed = started.elapsed();
        let statistics = aggregate(&detections, elapsed);

        info!(
            "Detected {} objects ({}) in {:.3}s",
            statistics.total_detections,
            statistics.summary(),
            statistics.processing_time
        );

        Ok(DetectionResult {
            processing_time: statistics.processing_time,
            detections,
            statistics,
            image_info,
            model_info: cached.info(),
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// Runs [`detect`](Self::detect) for each source in order. One entry per
    /// source; a failing image does not stop the rest.
    pub async fn detect_batch(
        &self,
        sources: Vec<ImageSource>,
        params: RawModelParams,
    ) -> Vec<DomainResult<DetectionResult>> {
        let total = sources.len();
        let mut results = Vec::with_capacity(total);
        for (i, source) in sources.into_iter().enumerate() {
            let outcome = self.detect(source, params.clone()).await;
            match &outcome {
                Ok(_) => debug!("Batch image {}/{} processed", i + 1, total),
                Err(e) => warn!(code = e.code(), "Batch image {}/{} failed: {}", i + 1, total, e),
            }
            results.push(outcome);
        }
        results
    }

    pub fn model_status(&self) -> DomainResult<ModelStatus> {
        self.cache.status()
    }

    /// Combina `params` con la configuración activa y recarga el detector.
    /// Si el cliente pide un modelo que no existe, el error es del cliente.
    pub async fn reconfigure(&self, params: RawModelParams) -> DomainResult<ModelStatus> {
        let config = params.validate_over(&self.cache.active_config()?)?;
        let requested = params.names_model();

        self.cache.reload(config).await.map_err(|e| match e {
            DomainError::ModelNotFound { model, .. } => {
                warn!(%model, requested, "reconfigure pointed at a missing model");
                DomainError::ModelNotFound { model, requested }
            }
            other => other,
        })?;
        self.cache.status()
    }
}
