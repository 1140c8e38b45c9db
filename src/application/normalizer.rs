use crate::domain::{
    detection::{BoundingBox, Detection, RawDetection},
    image::ImageInfo,
    model::ModelConfiguration,
};

/// Converts raw detector output into [`Detection`]s for the given image.
///
/// Keeps the detector's order (already NMS'd and confidence-sorted), drops
/// classes outside `config.target_classes`, clips boxes to the image and
/// truncates to `config.max_detections` after filtering. Unknown class ids are
/// kept under the `"unknown"` label so counts stay truthful.
pub fn normalize(raw: &[RawDetection], image: &ImageInfo, config: &ModelConfiguration) -> Vec<Detection> {
    raw.iter()
        .filter(|r| config.keeps_class(r.class_id))
        .take(config.max_detections)
        .map(|r| {
            let bbox = BoundingBox::clipped(r.x1, r.y1, r.x2, r.y2, image.width, image.height);
            Detection::new(r.class_id, r.confidence, bbox, (image.width, image.height))
        })
        .collect()
}
