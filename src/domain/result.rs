use time::OffsetDateTime;

use super::detection::Detection;
use super::image::ImageInfo;
use super::model::ModelInfo;
use super::stats::Statistics;

/// Outcome of one detection request. Built once by the orchestrator and
/// handed to the response path by value.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub statistics: Statistics,
    pub image_info: ImageInfo,
    /// Seconds spent in inference and post-processing.
    pub processing_time: f64,
    /// The detector that produced this result.
    pub model_info: ModelInfo,
    pub timestamp: OffsetDateTime,
}
