pub mod capture;
pub mod pipeline;
pub mod tracking;

use std::path::{Path, PathBuf};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::capture::driver::VideoMode;
use crate::pipeline::driver::OnReadError;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

/// Which camera driver backs the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    /// Specific device identifier; `None` selects any available device
    pub device_uri: Option<String>,
    pub depth: VideoMode,
    pub color: VideoMode,
    /// Request depth-to-color registration (best-effort)
    pub registration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub on_read_error: OnReadError,
    /// Bound on loop iterations; `None` runs until interrupted
    pub max_frames: Option<u64>,
    /// Every Nth submission is retained as a keyframe by the reference
    /// recorder
    pub keyframe_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub trajectory_path: PathBuf,
    pub keyframe_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            pipeline: PipelineConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSource::Synthetic,
            device_uri: None,
            depth: VideoMode::depth_default(),
            color: VideoMode::color_default(),
            registration: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_read_error: OnReadError::Skip,
            max_frames: None,
            keyframe_interval: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            trajectory_path: PathBuf::from("CameraTrajectory.txt"),
            keyframe_path: PathBuf::from("KeyFrameTrajectory.txt"),
        }
    }
}

impl Config {
    /// Load settings from the TOML file given on the command line.
    /// Missing sections fall back to the defaults above.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }
}
