use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::error;

use snapscan::engine;
use snapscan::error::{Error, Result};
use snapscan::modes::{self, RunConfig, RunMode};
use snapscan::{capture, report};

#[derive(Parser)]
#[command(name = "snapscan")]
#[command(about = "Capture screenshots and analyze them with a pretrained object-detection model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a screenshot and print its path
    Take {
        #[arg(long, value_name = "DIR", default_value = "screenshots")]
        output_dir: PathBuf,
        /// Filename stem for the screenshot
        #[arg(long, default_value = "debug")]
        prefix: String,
    },
    /// Analyze an existing image and print the JSON result
    Analyze {
        /// Image file to analyze
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        #[arg(long, value_name = "DIR", default_value = "analysis_results")]
        output_dir: PathBuf,
        /// Detection model path (fetched to the cache when absent)
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
        /// Confidence threshold, 0..1
        #[arg(long, default_value_t = 0.25)]
        confidence: f32,
    },
    /// One-shot capture and analyze, for visual debugging feedback
    Debug {
        /// Description of the action under debug, folded into filenames
        #[arg(long)]
        action: Option<String>,
        #[arg(long, value_name = "DIR", default_value = "debug_results")]
        output_dir: PathBuf,
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
        #[arg(long, default_value_t = 0.25)]
        confidence: f32,
    },
    /// Capture and analyze repeatedly at a fixed interval until interrupted
    Schedule {
        #[arg(long, value_name = "N")]
        interval_minutes: u64,
        #[arg(long, value_name = "DIR", default_value = "debug_results")]
        output_dir: PathBuf,
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
        #[arg(long, default_value_t = 0.25)]
        confidence: f32,
    },
    /// Watch a directory and analyze new images as they appear
    Watch {
        #[arg(long, value_name = "DIR")]
        watch_dir: PathBuf,
        #[arg(long, value_name = "DIR", default_value = "analysis_results")]
        output_dir: PathBuf,
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
        #[arg(long, default_value_t = 0.25)]
        confidence: f32,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e}");
            let code = if matches!(e, Error::InvalidOption(_)) { 2 } else { 1 };
            process::exit(code);
        }
    }
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Take { output_dir, prefix } => {
            let shot = capture::capture(&output_dir, &prefix)?;
            println!("{}", shot.path.display());
            Ok(0)
        }
        Command::Analyze {
            image,
            output_dir,
            model,
            confidence,
        } => {
            let confidence = validate_confidence(confidence)?;
            let engine = engine::initialize(&model_path(model)?)?;
            let result = report::analyze(&image, engine.as_ref(), confidence, &output_dir);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.success { 0 } else { 1 })
        }
        Command::Debug {
            action,
            output_dir,
            model,
            confidence,
        } => {
            let confidence = validate_confidence(confidence)?;
            let engine = engine::initialize(&model_path(model)?)?;
            let result =
                modes::one_shot(action.as_deref(), &output_dir, engine.as_ref(), confidence);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.success { 0 } else { 1 })
        }
        Command::Schedule {
            interval_minutes,
            output_dir,
            model,
            confidence,
        } => {
            let confidence = validate_confidence(confidence)?;
            let engine = engine::initialize(&model_path(model)?)?;
            let stop = install_stop_handler()?;
            let config = RunConfig {
                mode: RunMode::Scheduled {
                    interval: Duration::from_secs(interval_minutes.saturating_mul(60)),
                },
                output_dir,
                confidence,
            };
            modes::run(&config, engine.as_ref(), &stop)?;
            Ok(0)
        }
        Command::Watch {
            watch_dir,
            output_dir,
            model,
            confidence,
        } => {
            let confidence = validate_confidence(confidence)?;
            let engine = engine::initialize(&model_path(model)?)?;
            let stop = install_stop_handler()?;
            let config = RunConfig {
                mode: RunMode::Watch { dir: watch_dir },
                output_dir,
                confidence,
            };
            modes::run(&config, engine.as_ref(), &stop)?;
            Ok(0)
        }
    }
}

fn model_path(model: Option<PathBuf>) -> Result<PathBuf> {
    match model {
        Some(path) => Ok(path),
        None => engine::fetch::default_model_path(),
    }
}

fn validate_confidence(confidence: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(Error::InvalidOption(format!(
            "confidence must be within 0..1, got {confidence}"
        )))
    }
}

fn install_stop_handler() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    Ok(stop)
}
