use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::{
    detection::{Detection, NormalizedBox},
    errors::{DomainError, DomainResult},
    image::ImageInfo,
    model::{ModelInfo, ModelStatus, RawModelParams, TargetClass},
    result::DetectionResult,
    stats::Statistics,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBoxDto {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
    pub height: f32,
    pub center: [f32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDto {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBoxDto,
    pub bbox_normalized: NormalizedBox,
}

impl From<&Detection> for DetectionDto {
    fn from(d: &Detection) -> Self {
        let b = d.bbox();
        let (cx, cy) = b.center();
        Self {
            class_id: d.class_id(),
            class_name: d.class_name().to_string(),
            confidence: d.confidence(),
            bbox: BoundingBoxDto {
                x1: b.x1(),
                y1: b.y1(),
                x2: b.x2(),
                y2: b.y2(),
                width: b.width(),
                height: b.height(),
                center: [cx, cy],
            },
            bbox_normalized: d.bbox_normalized(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<DetectionDto>,
    pub statistics: Statistics,
    pub image_info: ImageInfo,
    pub processing_time: f64,
    pub model_info: ModelInfo,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
}

impl From<DetectionResult> for DetectionResponse {
    fn from(r: DetectionResult) -> Self {
        Self {
            success: true,
            detections: r.detections.iter().map(DetectionDto::from).collect(),
            statistics: r.statistics,
            image_info: r.image_info,
            processing_time: r.processing_time,
            model_info: r.model_info,
            timestamp: r.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    pub success: bool,
    pub status: ModelStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Reads detection parameters from a JSON object. Present-but-mistyped values
/// fail with the same error kind as out-of-range ones.
pub fn params_from_json(obj: &Value) -> DomainResult<RawModelParams> {
    let field = |name: &str| obj.get(name).filter(|v| !v.is_null());

    let confidence = match field("confidence") {
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| DomainError::InvalidConfidence(format!("{v} is not a number")))?,
        ),
        None => None,
    };
    let iou_threshold = match field("iou_threshold") {
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| DomainError::InvalidIouThreshold(format!("{v} is not a number")))?,
        ),
        None => None,
    };
    let max_detections = match field("max_detections") {
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| DomainError::InvalidMaxDetections(format!("{v} is not an integer")))?,
        ),
        None => None,
    };
    let target_classes = match field("target_classes") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(TargetClass::Id),
                    Value::String(s) => TargetClass::parse(s),
                    _ => None,
                })
                .collect(),
        ),
        Some(Value::String(s)) => Some(parse_class_list(s)),
        _ => None,
    };

    Ok(RawModelParams {
        model_name: field("model_name").and_then(Value::as_str).map(str::to_string),
        model_path: field("model_path").and_then(Value::as_str).map(str::to_string),
        confidence,
        iou_threshold,
        max_detections,
        target_classes,
    })
}

/// Reads detection parameters from multipart text fields.
pub fn params_from_form(fields: &HashMap<String, String>) -> DomainResult<RawModelParams> {
    let field = |name: &str| fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty());

    let confidence = field("confidence")
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| DomainError::InvalidConfidence(format!("{s:?} is not a number")))
        })
        .transpose()?;
    let iou_threshold = field("iou_threshold")
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| DomainError::InvalidIouThreshold(format!("{s:?} is not a number")))
        })
        .transpose()?;
    let max_detections = field("max_detections")
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| DomainError::InvalidMaxDetections(format!("{s:?} is not an integer")))
        })
        .transpose()?;

    Ok(RawModelParams {
        confidence,
        iou_threshold,
        max_detections,
        target_classes: field("target_classes").map(parse_class_list),
        ..Default::default()
    })
}

/// `"0, glass,2"` -> `[Id(0), Name("glass"), Id(2)]`.
fn parse_class_list(s: &str) -> Vec<TargetClass> {
    s.split(',').filter_map(TargetClass::parse).collect()
}
