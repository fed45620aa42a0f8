use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use xcap::Monitor;

use crate::error::{Error, Result};

/// Upper bound on how long a single grab may take before it is treated
/// as unavailable rather than left hanging.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// A screenshot artifact on disk. Immutable once written; downstream
/// components reference it by path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub path: PathBuf,
    pub captured_at: String,
    pub width: u32,
    pub height: u32,
}

/// Filesystem-safe timestamp, e.g. `2026-08-30T14-05-33`.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]-[minute]-[second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Reduce a user-supplied filename stem to something that cannot escape
/// the output directory.
pub fn sanitize_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}

fn grab_primary() -> Result<RgbaImage> {
    let monitors = Monitor::all().map_err(|e| Error::CaptureUnavailable(e.to_string()))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
        .ok_or_else(|| Error::CaptureUnavailable("no monitors found".to_string()))?;
    monitor
        .capture_image()
        .map_err(|e| Error::CaptureUnavailable(e.to_string()))
}

/// Capture the current full screen and write it under `output_dir` as
/// `{prefix}_{timestamp}.png`, creating the directory if needed.
pub fn capture(output_dir: &Path, prefix: &str) -> Result<Screenshot> {
    fs::create_dir_all(output_dir)?;

    let prefix = sanitize_prefix(prefix);
    let captured_at = timestamp();
    let path = output_dir.join(format!("{prefix}_{captured_at}.png"));

    // The grab runs on a helper thread so a stuck display server cannot
    // hang the caller past CAPTURE_TIMEOUT.
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(grab_primary());
    });
    let image = rx
        .recv_timeout(CAPTURE_TIMEOUT)
        .map_err(|_| {
            Error::CaptureUnavailable(format!(
                "capture did not complete within {}s",
                CAPTURE_TIMEOUT.as_secs()
            ))
        })??;

    let (width, height) = image.dimensions();
    debug!("captured {width}x{height} frame");

    image
        .save(&path)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    let path = path.canonicalize().unwrap_or(path);

    info!("screenshot saved: {}", path.display());
    Ok(Screenshot {
        path,
        captured_at,
        width,
        height,
    })
}
