use serde::{Deserialize, Serialize};

use super::detection::class_name;
use super::errors::{DomainError, DomainResult};

pub const DEFAULT_MODEL_NAME: &str = "GarIA";
pub const DEFAULT_MODEL_PATH: &str = "models/GarIA.onnx";
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 1000;

/// A class filter entry: either a numeric class id or a class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetClass {
    Id(u32),
    Name(String),
}

impl TargetClass {
    /// Parses a form value: digits are ids, anything else a name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<u32>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(raw.to_lowercase()),
        })
    }

    pub fn matches(&self, class_id: u32) -> bool {
        match self {
            Self::Id(id) => *id == class_id,
            Self::Name(name) => name.eq_ignore_ascii_case(class_name(class_id)),
        }
    }
}

/// Inference parameters plus the model they apply to. Two configurations with
/// equal fields are interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub model_name: String,
    pub model_path: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub target_classes: Option<Vec<TargetClass>>,
}

impl Default for ModelConfiguration {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            target_classes: None,
        }
    }
}

impl ModelConfiguration {
    pub fn with_model(model_name: impl Into<String>, model_path: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Same weights file under the same name; thresholds are not compared.
    pub fn same_model(&self, other: &ModelConfiguration) -> bool {
        self.model_name == other.model_name && self.model_path == other.model_path
    }

    /// True when `class_id` passes the optional class filter.
    pub fn keeps_class(&self, class_id: u32) -> bool {
        match &self.target_classes {
            None => true,
            Some(targets) => targets.iter().any(|t| t.matches(class_id)),
        }
    }
}

/// Unvalidated parameters as they arrive from a request. Wide numeric types so
/// out-of-range input is still representable and can be rejected precisely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawModelParams {
    pub model_name: Option<String>,
    pub model_path: Option<String>,
    pub confidence: Option<f64>,
    pub iou_threshold: Option<f64>,
    pub max_detections: Option<i64>,
    pub target_classes: Option<Vec<TargetClass>>,
}

impl RawModelParams {
    /// Validates against the built-in defaults.
    pub fn validate(&self) -> DomainResult<ModelConfiguration> {
        self.validate_over(&ModelConfiguration::default())
    }

    /// Validates and fills omitted fields from `base`. Checked in order
    /// confidence, iou_threshold, max_detections; the first violation wins.
    pub fn validate_over(&self, base: &ModelConfiguration) -> DomainResult<ModelConfiguration> {
        let confidence_threshold = match self.confidence {
            Some(c) if !(0.0..=1.0).contains(&c) => {
                return Err(DomainError::InvalidConfidence(format!("{c} is outside [0, 1]")))
            }
            Some(c) => c as f32,
            None => base.confidence_threshold,
        };
        let iou_threshold = match self.iou_threshold {
            Some(v) if !(0.0..=1.0).contains(&v) => {
                return Err(DomainError::InvalidIouThreshold(format!("{v} is outside [0, 1]")))
            }
            Some(v) => v as f32,
            None => base.iou_threshold,
        };
        let max_detections = match self.max_detections {
            Some(n) if n < 1 => {
                return Err(DomainError::InvalidMaxDetections(format!("{n} is below 1")))
            }
            Some(n) => usize::try_from(n)
                .map_err(|_| DomainError::InvalidMaxDetections(format!("{n} is too large")))?,
            None => base.max_detections,
        };

        let model_name = non_blank(&self.model_name).unwrap_or_else(|| base.model_name.clone());
        let model_path = non_blank(&self.model_path).unwrap_or_else(|| base.model_path.clone());
        let target_classes = match &self.target_classes {
            Some(t) if t.is_empty() => None,
            Some(t) => Some(dedup(t)),
            None => base.target_classes.clone(),
        };

        Ok(ModelConfiguration {
            model_name,
            model_path,
            confidence_threshold,
            iou_threshold,
            max_detections,
            target_classes,
        })
    }

    /// True when the request names a model other than what `base` describes.
    pub fn names_model(&self) -> bool {
        non_blank(&self.model_name).is_some() || non_blank(&self.model_path).is_some()
    }
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn dedup(targets: &[TargetClass]) -> Vec<TargetClass> {
    let mut out: Vec<TargetClass> = Vec::with_capacity(targets.len());
    for t in targets {
        if !out.contains(t) {
            out.push(t.clone());
        }
    }
    out
}

/// Load state of the active model, shaped like the status payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub status: String,
    pub model_name: String,
    pub model_path: String,
    pub device: Option<String>,
    pub task: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub loaded_at: Option<time::OffsetDateTime>,
}

impl ModelInfo {
    pub fn loaded(config: &ModelConfiguration, device: &str, loaded_at: time::OffsetDateTime) -> Self {
        Self {
            status: "loaded".into(),
            model_name: config.model_name.clone(),
            model_path: config.model_path.clone(),
            device: Some(device.to_string()),
            task: "detect".into(),
            loaded_at: Some(loaded_at),
        }
    }

    pub fn not_loaded(config: &ModelConfiguration) -> Self {
        Self {
            status: "not_loaded".into(),
            model_name: config.model_name.clone(),
            model_path: config.model_path.clone(),
            device: None,
            task: "detect".into(),
            loaded_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub model_config: ModelConfiguration,
    pub model_info: ModelInfo,
}
