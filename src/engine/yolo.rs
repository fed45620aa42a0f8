use std::cmp::Ordering;

use image::{DynamicImage, Rgb, RgbImage, imageops};
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, NdTensorView};

use crate::engine::labels::COCO_CLASSES;
use crate::error::{Error, Result};
use crate::models::{BoundingBox, Detection};

/// Side length of the square model input.
pub const INPUT_SIZE: usize = 640;

const IOU_THRESHOLD: f32 = 0.45;

/// How the source image was mapped into the letterboxed model input,
/// needed to map predicted boxes back.
pub(crate) struct Preprocess {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    src_width: u32,
    src_height: u32,
}

/// Resize to fit `size`x`size` preserving aspect ratio, pad with gray,
/// and convert to a normalized NCHW float tensor.
pub(crate) fn letterbox(img: &DynamicImage, size: usize) -> (NdTensor<f32, 4>, Preprocess) {
    let rgb = img.to_rgb8();
    let (src_width, src_height) = rgb.dimensions();

    let scale = (size as f32 / src_width as f32).min(size as f32 / src_height as f32);
    let scaled_w = ((src_width as f32 * scale) as u32).max(1);
    let scaled_h = ((src_height as f32 * scale) as u32).max(1);
    let resized = imageops::resize(&rgb, scaled_w, scaled_h, imageops::FilterType::CatmullRom);

    let pad_x = (size as u32 - scaled_w) / 2;
    let pad_y = (size as u32 - scaled_h) / 2;
    let mut canvas = RgbImage::from_pixel(size as u32, size as u32, Rgb([114, 114, 114]));
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let mut tensor = NdTensor::zeros([1, 3, size, size]);
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        Preprocess {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            src_width,
            src_height,
        },
    )
}

struct RawBox {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    score: f32,
    class: usize,
}

impl RawBox {
    fn area(&self) -> f32 {
        (self.x1 - self.x0).max(0.0) * (self.y1 - self.y0).max(0.0)
    }

    fn iou(&self, other: &RawBox) -> f32 {
        let ix = (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0);
        let iy = (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Decode a `[1, 4 + classes, anchors]` prediction tensor into detections
/// at or above `threshold`, suppressing overlapping boxes per class.
pub(crate) fn decode(
    preds: NdTensorView<f32, 3>,
    pre: &Preprocess,
    threshold: f32,
) -> Result<Vec<Detection>> {
    let [_, attrs, anchors] = preds.shape();
    if attrs < 5 {
        return Err(Error::Inference(format!(
            "unexpected output layout: {attrs} attributes per box"
        )));
    }
    let classes = attrs - 4;

    let mut boxes = Vec::new();
    for i in 0..anchors {
        let mut best = 0usize;
        let mut best_score = 0.0f32;
        for c in 0..classes {
            let score = preds[[0, 4 + c, i]];
            if score > best_score {
                best_score = score;
                best = c;
            }
        }
        if best_score < threshold {
            continue;
        }
        let cx = preds[[0, 0, i]];
        let cy = preds[[0, 1, i]];
        let w = preds[[0, 2, i]];
        let h = preds[[0, 3, i]];
        boxes.push(RawBox {
            x0: cx - w / 2.0,
            y0: cy - h / 2.0,
            x1: cx + w / 2.0,
            y1: cy + h / 2.0,
            score: best_score,
            class: best,
        });
    }

    let kept = nms(boxes, IOU_THRESHOLD);
    Ok(kept.into_iter().map(|b| to_detection(b, pre)).collect())
}

fn nms(mut boxes: Vec<RawBox>, iou_limit: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut kept: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        if kept
            .iter()
            .all(|k| k.class != candidate.class || k.iou(&candidate) < iou_limit)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn to_detection(b: RawBox, pre: &Preprocess) -> Detection {
    let max_x = (pre.src_width - 1) as f32;
    let max_y = (pre.src_height - 1) as f32;
    let x0 = ((b.x0 - pre.pad_x) / pre.scale).clamp(0.0, max_x);
    let y0 = ((b.y0 - pre.pad_y) / pre.scale).clamp(0.0, max_y);
    let x1 = ((b.x1 - pre.pad_x) / pre.scale).clamp(0.0, max_x);
    let y1 = ((b.y1 - pre.pad_y) / pre.scale).clamp(0.0, max_y);

    Detection {
        label: COCO_CLASSES
            .get(b.class)
            .copied()
            .unwrap_or("object")
            .to_string(),
        confidence: b.score,
        bbox: BoundingBox {
            x: x0.round() as u32,
            y: y0.round() as u32,
            width: (x1 - x0).round().max(1.0) as u32,
            height: (y1 - y0).round().max(1.0) as u32,
        },
    }
}

/// Deterministic report order: descending confidence, ties broken by
/// ascending label, then ascending bbox x.
pub fn sort_detections(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.bbox.x.cmp(&b.bbox.x))
    });
}

/// Keep only detections at or above `threshold`.
pub fn apply_threshold(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}
