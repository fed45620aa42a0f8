use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::annotate;
use crate::capture;
use crate::engine::Detector;
use crate::error::{Error, Result};
use crate::models::Detection;

/// The outcome of one analysis cycle. Returned by value and persisted to
/// disk as the JSON report; field names are stable (additive changes
/// only) so downstream debug tooling keeps working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub source_image: Option<PathBuf>,
    pub detections: Vec<Detection>,
    pub objects_count: usize,
    /// Annotated copy of the source image, when any object was detected.
    pub visual_feedback: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub message: Option<String>,
    pub timestamp: String,
    /// Wall-clock seconds spent on this analysis.
    pub time_taken: f64,
}

impl AnalysisResult {
    pub fn failure(source_image: Option<PathBuf>, message: String) -> Self {
        AnalysisResult {
            success: false,
            source_image,
            detections: Vec::new(),
            objects_count: 0,
            visual_feedback: None,
            report_path: None,
            message: Some(message),
            timestamp: capture::timestamp(),
            time_taken: 0.0,
        }
    }
}

/// Run detection on `image_path` and persist the annotated image and
/// JSON report under `output_dir`.
///
/// Never returns an error: engine and I/O failures become a result with
/// `success == false` and a descriptive message, so long-running callers
/// inspect `success` instead of catching errors.
pub fn analyze(
    image_path: &Path,
    detector: &dyn Detector,
    confidence_threshold: f32,
    output_dir: &Path,
) -> AnalysisResult {
    let started = Instant::now();
    match run_analysis(image_path, detector, confidence_threshold, output_dir, started) {
        Ok(result) => result,
        Err(e) => {
            warn!("analysis of {} failed: {e}", image_path.display());
            let mut result = AnalysisResult::failure(Some(image_path.to_path_buf()), e.to_string());
            result.time_taken = started.elapsed().as_secs_f64();
            result
        }
    }
}

fn run_analysis(
    image_path: &Path,
    detector: &dyn Detector,
    confidence_threshold: f32,
    output_dir: &Path,
    started: Instant,
) -> Result<AnalysisResult> {
    fs::create_dir_all(output_dir)?;

    let detections = detector.detect(image_path, confidence_threshold)?;

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let visual_feedback = if detections.is_empty() {
        info!("no objects detected in {}", image_path.display());
        None
    } else {
        let img = image::open(image_path)
            .map_err(|e| Error::InvalidImage(format!("{}: {e}", image_path.display())))?;
        let annotated = annotate::render(&img, &detections);
        let path = output_dir.join(format!("{stem}_annotated.png"));
        annotated
            .save(&path)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        info!(
            "{} objects detected, visual feedback saved: {}",
            detections.len(),
            path.display()
        );
        Some(path)
    };

    let timestamp = capture::timestamp();
    let report_path = output_dir.join(format!("{stem}_{timestamp}.json"));

    let result = AnalysisResult {
        success: true,
        source_image: Some(image_path.to_path_buf()),
        objects_count: detections.len(),
        detections,
        visual_feedback,
        report_path: Some(report_path.clone()),
        message: None,
        timestamp,
        time_taken: started.elapsed().as_secs_f64(),
    };

    fs::write(&report_path, serde_json::to_string_pretty(&result)?)?;
    Ok(result)
}

/// Read a persisted report back. Round-trips the detection sequence in
/// its original order.
pub fn load_report(path: &Path) -> Result<AnalysisResult> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
