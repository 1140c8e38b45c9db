#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recyclable_detector::adapters::fetch::http_fetcher::HttpImageFetcher;
use recyclable_detector::adapters::http::state::HttpState;
use recyclable_detector::application::detector_cache::DetectorCache;
use recyclable_detector::application::image_source::ImageResolver;
use recyclable_detector::application::ports::{
    DetectorLoaderPort, DetectorPort, ImageFetchPort, LoadedDetector,
};
use recyclable_detector::application::services::DetectionService;
use recyclable_detector::domain::detection::RawDetection;
use recyclable_detector::domain::errors::{DomainError, DomainResult};
use recyclable_detector::domain::model::ModelConfiguration;

/// Returns a fixed batch of detections, or fails when `fail` is set.
#[derive(Default)]
pub struct ScriptedDetector {
    pub output: Vec<RawDetection>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl DetectorPort for ScriptedDetector {
    fn detect(&self, _image: &RgbImage, _config: &ModelConfiguration) -> DomainResult<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DomainError::InferenceFailed("scripted failure".into()));
        }
        Ok(self.output.clone())
    }
}

/// Hands out the scripted detector; paths containing "missing" do not exist.
pub struct FakeLoader {
    pub detector: Arc<ScriptedDetector>,
    pub loads: AtomicUsize,
}

impl DetectorLoaderPort for FakeLoader {
    fn load(&self, config: &ModelConfiguration) -> DomainResult<LoadedDetector> {
        if config.model_path.contains("missing") {
            return Err(DomainError::ModelNotFound {
                model: config.model_path.clone(),
                requested: false,
            });
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedDetector {
            detector: self.detector.clone(),
            device: "cpu".into(),
        })
    }
}

pub struct StaticFetcher(pub Vec<u8>);

#[async_trait]
impl ImageFetchPort for StaticFetcher {
    async fn fetch(&self, _url: &str) -> DomainResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Serves `bytes` after sleeping for `delay`, like a slow remote host.
pub struct SlowFetcher {
    pub bytes: Vec<u8>,
    pub delay: Duration,
}

#[async_trait]
impl ImageFetchPort for SlowFetcher {
    async fn fetch(&self, _url: &str) -> DomainResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.bytes.clone())
    }
}

pub struct Harness {
    pub service: Arc<DetectionService>,
    pub loader: Arc<FakeLoader>,
    pub detector: Arc<ScriptedDetector>,
}

impl Harness {
    pub fn loads(&self) -> usize {
        self.loader.loads.load(Ordering::SeqCst)
    }

    pub fn inference_calls(&self) -> usize {
        self.detector.calls.load(Ordering::SeqCst)
    }

    pub fn http_state(&self, debug: bool) -> HttpState {
        HttpState {
            detection: self.service.clone(),
            debug,
            max_upload_bytes: 4 * 1024 * 1024,
        }
    }
}

pub fn harness_with(detector: ScriptedDetector, fetcher: Arc<dyn ImageFetchPort>) -> Harness {
    let detector = Arc::new(detector);
    let loader = Arc::new(FakeLoader {
        detector: detector.clone(),
        loads: AtomicUsize::new(0),
    });
    let cache = Arc::new(DetectorCache::new(loader.clone(), ModelConfiguration::default()));
    let service = Arc::new(DetectionService::new(ImageResolver::new(fetcher), cache));
    Harness { service, loader, detector }
}

pub fn harness(output: Vec<RawDetection>) -> Harness {
    harness_with(
        ScriptedDetector { output, ..Default::default() },
        Arc::new(StaticFetcher(png_bytes(64, 32))),
    )
}

/// Harness whose URL fetches go over real HTTP with the given timeout.
pub fn harness_with_http_fetch(output: Vec<RawDetection>, timeout: Duration) -> Harness {
    harness_with(
        ScriptedDetector { output, ..Default::default() },
        Arc::new(HttpImageFetcher::new(timeout, 1024 * 1024).unwrap()),
    )
}

pub fn raw(class_id: u32, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
    RawDetection { class_id, confidence, x1, y1, x2, y2 }
}

/// Detector output for two plastic items and one metal item, NMS order.
pub fn plastic_plastic_metal() -> Vec<RawDetection> {
    vec![
        raw(0, 0.9, 2.0, 2.0, 20.0, 20.0),
        raw(1, 0.8, 30.0, 4.0, 60.0, 30.0),
        raw(0, 0.6, 10.0, 10.0, 40.0, 28.0),
    ]
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 120, 60])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .unwrap_or_else(|e| panic!("failed to encode test png: {e}"));
    buf.into_inner()
}
