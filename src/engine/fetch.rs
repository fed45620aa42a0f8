use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL_FILENAME: &str = "yolov8n.rten";

const DEFAULT_MODEL_URL: &str = "https://rten-models.s3.amazonaws.com/yolov8n.rten";

/// Well-known cache location for the default model, e.g.
/// `~/.cache/snapscan/yolov8n.rten`.
pub fn default_model_path() -> Result<PathBuf> {
    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map_err(|_| Error::ModelUnavailable {
            path: PathBuf::from(DEFAULT_MODEL_FILENAME),
            reason: "cannot determine home directory for the model cache".to_string(),
        })?;
    Ok(Path::new(&home)
        .join(".cache/snapscan")
        .join(DEFAULT_MODEL_FILENAME))
}

/// Download the default pretrained model and cache it at `dest`.
///
/// The URL can be overridden with `SNAPSCAN_MODEL_URL`. The download
/// lands in a `.partial` sibling first so a failed transfer never leaves
/// a truncated model at `dest`.
pub fn fetch_default_model(dest: &Path) -> Result<()> {
    let url = env::var("SNAPSCAN_MODEL_URL").unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string());
    info!(
        "model not found at {}, fetching {url}",
        dest.display()
    );

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let response = ureq::get(&url).call().map_err(|e| Error::ModelUnavailable {
        path: dest.to_path_buf(),
        reason: format!("fetch failed: {e}"),
    })?;

    let tmp = dest.with_extension("partial");
    let mut file = fs::File::create(&tmp)?;
    if let Err(e) = std::io::copy(&mut response.into_reader(), &mut file) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::ModelUnavailable {
            path: dest.to_path_buf(),
            reason: format!("download interrupted: {e}"),
        });
    }
    fs::rename(&tmp, dest)?;

    info!("cached default model at {}", dest.display());
    Ok(())
}
