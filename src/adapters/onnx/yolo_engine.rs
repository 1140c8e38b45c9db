use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::sync::Mutex;

use crate::application::ports::DetectorPort;
use crate::domain::detection::{BoundingBox, RawDetection};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelConfiguration;

/// YOLOv8-style ONNX detector: output `[1, 4 + num_classes, candidates]`
/// with `cx, cy, w, h` in model-input pixels.
pub struct OnnxYoloEngine {
    session: Mutex<Session>,
    input_size: u32,
    device: &'static str,
}

impl OnnxYoloEngine {
    pub fn load(path: &str, input_size: u32, intra_threads: usize) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(intra_threads)?;

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        let cuda = CUDAExecutionProvider::default();
        let mut device = "cpu";
        if cuda.is_available().unwrap_or(false) {
            if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda.build()]) {
                builder = builder_with_cuda;
                device = "cuda";
            }
        }

        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self { session: Mutex::new(session), input_size, device })
    }

    pub fn device(&self) -> &'static str {
        self.device
    }

    pub fn infer(&self, rgb: &RgbImage, params: &ModelConfiguration) -> Result<Vec<RawDetection>> {
        let imgsz = self.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Value::from_array((input_shape, input.into_raw_vec_and_offset().0))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("onnx session lock poisoned"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 || dims[1] <= 4 {
            return Err(anyhow!("unexpected output shape {dims:?}"));
        }
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0);

        let num_candidates = view.shape()[1];
        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;

        let mut candidates = Vec::new();
        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let Some((class_id, &max_score)) = scores
                .indexed_iter()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                continue;
            };

            if max_score >= params.confidence_threshold && params.keeps_class(class_id as u32) {
                let cx = view[[0, i]];
                let cy = view[[1, i]];
                let w = view[[2, i]];
                let h = view[[3, i]];

                candidates.push(RawDetection {
                    class_id: class_id as u32,
                    confidence: max_score,
                    x1: (cx - w / 2.0) * sx,
                    y1: (cy - h / 2.0) * sy,
                    x2: (cx + w / 2.0) * sx,
                    y2: (cy + h / 2.0) * sy,
                });
            }
        }

        let mut kept = non_max_suppression(candidates, params.iou_threshold);
        kept.truncate(params.max_detections);
        Ok(kept)
    }
}

impl DetectorPort for OnnxYoloEngine {
    fn detect(&self, image: &RgbImage, config: &ModelConfiguration) -> DomainResult<Vec<RawDetection>> {
        self.infer(image, config)
            .map_err(|e| DomainError::InferenceFailed(e.to_string()))
    }
}

/// Class-aware greedy NMS. Output is sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let boxes: Vec<BoundingBox> = detections
        .iter()
        .map(|d| BoundingBox::new(d.x1, d.y1, d.x2, d.y2))
        .collect();
    let mut suppress = vec![false; detections.len()];
    let mut keep = Vec::new();

    for i in 0..detections.len() {
        if suppress[i] {
            continue;
        }
        keep.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if !suppress[j]
                && detections[i].class_id == detections[j].class_id
                && boxes[i].iou(&boxes[j]) > iou_threshold
            {
                suppress[j] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32, x1: f32) -> RawDetection {
        RawDetection { class_id, confidence, x1, y1: 0.0, x2: x1 + 10.0, y2: 10.0 }
    }

    #[test]
    fn nms_suppresses_same_class_overlaps() {
        let out = non_max_suppression(vec![det(0, 0.5, 1.0), det(0, 0.9, 0.0), det(0, 0.7, 50.0)], 0.45);
        let confs: Vec<f32> = out.iter().map(|d| d.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.7]);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_other_classes() {
        let out = non_max_suppression(vec![det(0, 0.9, 0.0), det(1, 0.8, 0.0)], 0.45);
        assert_eq!(out.len(), 2);
    }
}
