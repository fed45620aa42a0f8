pub mod annotate;
pub mod capture;
pub mod engine;
pub mod error;
pub mod models;
pub mod modes;
pub mod report;

pub use capture::Screenshot;
pub use engine::{Detector, EngineHandle, initialize};
pub use error::{Error, Result};
pub use models::{BoundingBox, Detection};
pub use modes::{RunConfig, RunMode};
pub use report::{AnalysisResult, analyze};
