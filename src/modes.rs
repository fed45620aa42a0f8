use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, error, info, warn};

use crate::capture;
use crate::engine::Detector;
use crate::error::{Error, Result};
use crate::report::{self, AnalysisResult};

/// Granularity of cancellable waits. Stop requests take effect within
/// one slice.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls after which an undecodable file is marked permanently failed
/// instead of retried.
pub const MAX_DECODE_RETRIES: u32 = 3;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// The temporal pattern driving capture and analysis.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// One capture+analyze cycle; `action` is metadata folded into the
    /// output filenames.
    OneShot { action: Option<String> },
    /// Repeat the one-shot cycle at a fixed interval until cancelled.
    Scheduled { interval: Duration },
    /// Analyze new image files appearing in a directory until cancelled.
    Watch { dir: PathBuf },
}

/// Immutable per-invocation configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub output_dir: PathBuf,
    pub confidence: f32,
}

/// Drive the configured mode to completion. One-shot returns its result;
/// the long-running modes return `None` after cancellation.
pub fn run(
    config: &RunConfig,
    detector: &dyn Detector,
    stop: &AtomicBool,
) -> Result<Option<AnalysisResult>> {
    match &config.mode {
        RunMode::OneShot { action } => Ok(Some(one_shot(
            action.as_deref(),
            &config.output_dir,
            detector,
            config.confidence,
        ))),
        RunMode::Scheduled { interval } => {
            run_scheduled(*interval, config, detector, stop)?;
            Ok(None)
        }
        RunMode::Watch { dir } => {
            run_watch(dir, config, detector, stop)?;
            Ok(None)
        }
    }
}

/// Capture the screen and analyze it once. Capture failure becomes a
/// failed result here rather than an error, so a debug harness can
/// always inspect `success`.
pub fn one_shot(
    action: Option<&str>,
    output_dir: &Path,
    detector: &dyn Detector,
    confidence: f32,
) -> AnalysisResult {
    let prefix = match action {
        Some(a) if !a.is_empty() => format!("debug-{}", a.replace(' ', "_")),
        _ => "debug".to_string(),
    };

    let shot = match capture::capture(output_dir, &prefix) {
        Ok(shot) => shot,
        Err(e) => {
            error!("capture failed: {e}");
            return AnalysisResult::failure(None, format!("capture failed: {e}"));
        }
    };
    info!(
        "captured {} ({}x{})",
        shot.path.display(),
        shot.width,
        shot.height
    );

    report::analyze(&shot.path, detector, confidence, output_dir)
}

/// Fixed-interval trigger with drift correction: each deadline is the
/// previous deadline plus the interval, so analysis latency does not
/// accumulate. An overrunning cycle makes the next one start
/// immediately; missed ticks are caught up one at a time, never queued.
pub struct Schedule {
    interval: Duration,
    next: Instant,
}

impl Schedule {
    pub fn new(start: Instant, interval: Duration) -> Self {
        Schedule {
            interval,
            next: start,
        }
    }

    /// Whether a cycle is due at `now`, advancing the deadline if so.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        true
    }
}

fn run_scheduled(
    interval: Duration,
    config: &RunConfig,
    detector: &dyn Detector,
    stop: &AtomicBool,
) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::InvalidOption(
            "interval must be greater than zero".to_string(),
        ));
    }

    info!(
        "scheduled mode: one cycle every {}s, output to {}",
        interval.as_secs(),
        config.output_dir.display()
    );

    let mut schedule = Schedule::new(Instant::now(), interval);
    while !stop.load(Ordering::Relaxed) {
        if schedule.due(Instant::now()) {
            let result = one_shot(None, &config.output_dir, detector, config.confidence);
            if result.success {
                info!("cycle complete: {} objects detected", result.objects_count);
            } else {
                // A bad cycle never terminates the schedule.
                warn!(
                    "cycle failed: {}",
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
        } else {
            sleep_cancellable(SLEEP_SLICE, stop);
        }
    }

    info!("scheduled run cancelled");
    Ok(())
}

/// Identity of a watched file: path plus modification time, so a
/// rewritten file counts as new while an unchanged one is never
/// reprocessed within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Decode-retry bookkeeping for one path. A changed mtime means a new
/// identity, so the attempt count starts over.
struct RetryState {
    modified: SystemTime,
    attempts: u32,
}

/// Per-session watch state. Cleared on process restart.
#[derive(Default)]
pub struct WatchState {
    processed: HashSet<FileId>,
    retries: HashMap<PathBuf, RetryState>,
}

impl WatchState {
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Paths currently awaiting a decode retry.
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Scan `dir` once and analyze every image file whose identity has
    /// not been seen before. Files that fail to decode (still being
    /// written, or corrupt) are retried on later polls up to
    /// `MAX_DECODE_RETRIES`, then marked permanently failed.
    pub fn poll_once(
        &mut self,
        dir: &Path,
        detector: &dyn Detector,
        confidence: f32,
        output_dir: &Path,
    ) -> Result<Vec<AnalysisResult>> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_image_file(path))
            .collect();
        candidates.sort();

        // Drop retry entries for files that disappeared between polls.
        self.retries
            .retain(|path, _| candidates.binary_search(path).is_ok());

        let mut results = Vec::new();
        for path in candidates {
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let id = FileId {
                path: path.clone(),
                modified,
            };
            if self.processed.contains(&id) {
                continue;
            }

            if let Err(e) = image::open(&path) {
                let entry = self.retries.entry(path.clone()).or_insert(RetryState {
                    modified,
                    attempts: 0,
                });
                if entry.modified != modified {
                    entry.modified = modified;
                    entry.attempts = 0;
                }
                entry.attempts += 1;
                if entry.attempts >= MAX_DECODE_RETRIES {
                    warn!(
                        "giving up on undecodable file after {} attempts: {}",
                        entry.attempts,
                        path.display()
                    );
                    self.retries.remove(&path);
                    self.processed.insert(id);
                } else {
                    debug!("file not yet readable ({e}), will retry: {}", path.display());
                }
                continue;
            }
            self.retries.remove(&path);

            info!("analyzing new file: {}", path.display());
            let result = report::analyze(&path, detector, confidence, output_dir);
            if !result.success {
                warn!(
                    "analysis failed for {}: {}",
                    path.display(),
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
            self.processed.insert(id);
            results.push(result);
        }

        Ok(results)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

fn run_watch(
    dir: &Path,
    config: &RunConfig,
    detector: &dyn Detector,
    stop: &AtomicBool,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::InvalidOption(format!(
            "watch directory does not exist: {}",
            dir.display()
        )));
    }

    info!(
        "watch mode: polling {} every {}s",
        dir.display(),
        WATCH_POLL_INTERVAL.as_secs()
    );

    let mut state = WatchState::default();
    while !stop.load(Ordering::Relaxed) {
        match state.poll_once(dir, detector, config.confidence, &config.output_dir) {
            Ok(results) => {
                for result in &results {
                    if result.success {
                        info!(
                            "report written: {}",
                            result
                                .report_path
                                .as_deref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default()
                        );
                    }
                }
            }
            Err(e) => warn!("watch poll failed: {e}"),
        }
        sleep_cancellable(WATCH_POLL_INTERVAL, stop);
    }

    info!("watch run cancelled");
    Ok(())
}

/// Blocking wait that checks the stop flag at every slice boundary.
fn sleep_cancellable(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
