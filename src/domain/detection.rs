use serde::{Deserialize, Serialize};

/// Fixed class table of the waste model.
pub const CLASS_NAMES: [&str; 4] = ["plastic", "metal", "paper", "glass"];
pub const UNKNOWN_CLASS: &str = "unknown";

/// Resolves a class id; ids outside the table map to [`UNKNOWN_CLASS`].
pub fn class_name(class_id: u32) -> &'static str {
    CLASS_NAMES
        .get(class_id as usize)
        .copied()
        .unwrap_or(UNKNOWN_CLASS)
}

/// One detection as emitted by the detector capability, in pixel
/// coordinates of the image it was given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Axis-aligned box in absolute pixel coordinates, `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// Box relative to the image size: centre `x, y` plus `width, height`, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Orders the corners so the box is never inverted.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Like [`BoundingBox::new`] but clipped to a `width x height` image.
    pub fn clipped(x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new(
            x1.clamp(0.0, w),
            y1.clamp(0.0, h),
            x2.clamp(0.0, w),
            y2.clamp(0.0, h),
        )
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }
    pub fn y1(&self) -> f32 {
        self.y1
    }
    pub fn x2(&self) -> f32 {
        self.x2
    }
    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x_left = self.x1.max(other.x1);
        let y_top = self.y1.max(other.y1);
        let x_right = self.x2.min(other.x2);
        let y_bottom = self.y2.min(other.y2);
        if x_right <= x_left || y_bottom <= y_top {
            return 0.0;
        }
        let intersection = (x_right - x_left) * (y_bottom - y_top);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Computed on demand from the absolute box; zero-sized images give zeros.
    pub fn normalized(&self, image_width: u32, image_height: u32) -> NormalizedBox {
        if image_width == 0 || image_height == 0 {
            return NormalizedBox { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
        }
        let (w, h) = (image_width as f32, image_height as f32);
        let (cx, cy) = self.center();
        NormalizedBox {
            x: (cx / w).clamp(0.0, 1.0),
            y: (cy / h).clamp(0.0, 1.0),
            width: (self.width() / w).clamp(0.0, 1.0),
            height: (self.height() / h).clamp(0.0, 1.0),
        }
    }
}

/// A classified, located object. Carries the dimensions of the image it was
/// found in so its normalized box can always be derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    class_id: u32,
    class_name: String,
    confidence: f32,
    bbox: BoundingBox,
    image_size: (u32, u32),
}

impl Detection {
    pub fn new(class_id: u32, confidence: f32, bbox: BoundingBox, image_size: (u32, u32)) -> Self {
        Self {
            class_id,
            class_name: class_name(class_id).to_string(),
            confidence: if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) },
            bbox,
            image_size,
        }
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn bbox_normalized(&self) -> NormalizedBox {
        self.bbox.normalized(self.image_size.0, self.image_size.1)
    }
}
