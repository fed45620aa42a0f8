pub mod fetch;
pub mod labels;
pub mod yolo;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::error::{Error, Result};
use crate::models::Detection;

/// A forward pass taking longer than this is logged; the error path is
/// handled by per-cycle recovery in the run modes.
const INFERENCE_BUDGET: Duration = Duration::from_secs(30);

/// Seam between the run modes / aggregator and the real model, so tests
/// can substitute a stub.
pub trait Detector: Send + Sync {
    /// Returns detections with `confidence >= confidence_threshold`,
    /// ordered by descending confidence (ties: label, then bbox x).
    fn detect(&self, image_path: &Path, confidence_threshold: f32) -> Result<Vec<Detection>>;
}

/// A loaded detection model. Read-only after construction; shared across
/// cycles via `EngineHandle`.
pub struct Engine {
    model: Model,
    model_path: PathBuf,
}

pub type EngineHandle = Arc<Engine>;

static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, EngineHandle>>> = OnceLock::new();

/// Load the model at `model_path`, fetching the default model into place
/// first when the file is absent.
///
/// Handles are cached per canonical path for the lifetime of the process,
/// so repeated calls return the same `EngineHandle` without reloading.
/// The registry lock is held across the load, collapsing concurrent
/// first-time loads into one.
pub fn initialize(model_path: &Path) -> Result<EngineHandle> {
    let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    let mut registry = registry.lock().map_err(|_| Error::ModelUnavailable {
        path: model_path.to_path_buf(),
        reason: "engine registry poisoned".to_string(),
    })?;

    let key = model_path
        .canonicalize()
        .unwrap_or_else(|_| model_path.to_path_buf());
    if let Some(handle) = registry.get(&key) {
        debug!("reusing loaded model: {}", key.display());
        return Ok(handle.clone());
    }

    if !model_path.exists() {
        fetch::fetch_default_model(model_path)?;
    }
    // Canonicalization can only succeed now that the file exists.
    let key = model_path.canonicalize().unwrap_or(key);
    if let Some(handle) = registry.get(&key) {
        return Ok(handle.clone());
    }

    info!("loading detection model: {}", model_path.display());
    let model = Model::load_file(model_path).map_err(|e| Error::ModelUnavailable {
        path: model_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let handle = Arc::new(Engine {
        model,
        model_path: key.clone(),
    });
    registry.insert(key, handle.clone());
    Ok(handle)
}

impl Engine {
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Detector for Engine {
    fn detect(&self, image_path: &Path, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let img = image::open(image_path)
            .map_err(|e| Error::InvalidImage(format!("{}: {e}", image_path.display())))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::InvalidImage(format!(
                "{}: image has zero area",
                image_path.display()
            )));
        }

        let (input, pre) = yolo::letterbox(&img, yolo::INPUT_SIZE);

        let started = Instant::now();
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| Error::Inference(e.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|_| Error::Inference("model output is not a rank-3 float tensor".to_string()))?;
        let elapsed = started.elapsed();
        if elapsed > INFERENCE_BUDGET {
            warn!("forward pass took {elapsed:?}, over the {INFERENCE_BUDGET:?} budget");
        }

        let mut detections = yolo::decode(output.view(), &pre, confidence_threshold)?;
        yolo::sort_detections(&mut detections);
        debug!(
            "{} detections above {confidence_threshold} in {elapsed:?}",
            detections.len()
        );
        Ok(detections)
    }
}
