use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::domain::{detection::RawDetection, errors::DomainResult, model::ModelConfiguration};

/// Inference capability. Implementations must return detections already
/// de-duplicated (NMS) and sorted by descending confidence. Calls may block on
/// compute; callers run them on the blocking pool.
pub trait DetectorPort: Send + Sync {
    fn detect(&self, image: &RgbImage, config: &ModelConfiguration) -> DomainResult<Vec<RawDetection>>;
}

/// A freshly constructed detector plus the device it runs on.
pub struct LoadedDetector {
    pub detector: Arc<dyn DetectorPort>,
    pub device: String,
}

/// Builds detectors from a configuration's model path. Blocking.
pub trait DetectorLoaderPort: Send + Sync {
    fn load(&self, config: &ModelConfiguration) -> DomainResult<LoadedDetector>;
}

/// Retrieves the raw bytes behind an image URL, bounded by a timeout.
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    async fn fetch(&self, url: &str) -> DomainResult<Vec<u8>>;
}
