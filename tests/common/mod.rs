#![allow(dead_code)]

use std::path::Path;

use snapscan::engine::{Detector, yolo};
use snapscan::error::{Error, Result};
use snapscan::{BoundingBox, Detection};

/// Detector returning canned detections, filtered like the real engine.
pub struct StubDetector {
    pub detections: Vec<Detection>,
}

impl Detector for StubDetector {
    fn detect(&self, _image_path: &Path, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let mut detections = yolo::apply_threshold(self.detections.clone(), confidence_threshold);
        yolo::sort_detections(&mut detections);
        Ok(detections)
    }
}

/// Detector whose forward pass always fails.
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _image_path: &Path, _confidence_threshold: f32) -> Result<Vec<Detection>> {
        Err(Error::Inference("stubbed inference failure".to_string()))
    }
}

pub fn det(label: &str, confidence: f32, x: u32) -> Detection {
    Detection {
        label: label.to_string(),
        confidence,
        bbox: BoundingBox {
            x,
            y: 10,
            width: 20,
            height: 20,
        },
    }
}

/// Write a small decodable PNG for analysis tests.
pub fn write_test_image(path: &Path) -> anyhow::Result<()> {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    });
    img.save(path)?;
    Ok(())
}
