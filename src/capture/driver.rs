//! Driver port: the narrow slice of a depth-camera stack the pipeline needs

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::capture::frame::{PixelFormat, RawFrame};

/// The two sensor streams a session owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Depth,
    Color,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Depth => "depth",
            StreamKind::Color => "color",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video mode applied to a stream before it is started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMode {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub mirroring: bool,
}

impl VideoMode {
    pub fn depth_default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
            format: PixelFormat::Depth1Mm,
            mirroring: false,
        }
    }

    pub fn color_default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
            format: PixelFormat::Rgb888,
            mirroring: false,
        }
    }
}

/// Capture subsystem errors
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver layer failed to initialize: {0}")]
    Initialization(String),

    #[error("could not open device: {0}")]
    DeviceOpen(String),

    #[error("could not create {0} stream: {1}")]
    StreamCreate(StreamKind, String),

    #[error("unsupported mode on {0} stream: {1}")]
    Configuration(StreamKind, String),

    #[error("could not start {0} stream: {1}")]
    StreamStart(StreamKind, String),

    #[error("timed out waiting for a {0} frame")]
    ReadTimeout(StreamKind),

    #[error("read on {0} stream failed: {1}")]
    Read(StreamKind, String),

    #[error("{0} stream has not been started")]
    StreamNotStarted(StreamKind),

    #[error("session is closed")]
    SessionClosed,
}

impl DriverError {
    /// Read errors are non-fatal under the default pipeline policy;
    /// everything else aborts startup.
    pub fn is_read_error(&self) -> bool {
        matches!(self, DriverError::ReadTimeout(_) | DriverError::Read(_, _))
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Platform-agnostic camera driver trait.
///
/// Implemented per device stack; [`SyntheticCamera`](crate::capture::SyntheticCamera)
/// is the in-tree reference. The pipeline depends only on this operation set,
/// not on any driver's full surface.
pub trait CameraDriver: Send {
    /// Open a device. `None` selects any available device.
    fn open(&mut self, uri: Option<&str>) -> Result<()>;

    /// Create the named stream on the open device.
    fn create_stream(&mut self, kind: StreamKind) -> Result<()>;

    /// Apply a video mode to a created, not-yet-started stream.
    fn set_video_mode(&mut self, kind: StreamKind, mode: &VideoMode) -> Result<()>;

    /// Begin frame delivery on a configured stream.
    fn start_stream(&mut self, kind: StreamKind) -> Result<()>;

    /// Stop frame delivery. Must tolerate streams that never started.
    fn stop_stream(&mut self, kind: StreamKind);

    /// Post-start health check for a stream.
    fn stream_valid(&self, kind: StreamKind) -> bool;

    /// Whether the device can map depth pixels into the color frame.
    fn supports_depth_registration(&self) -> bool;

    /// Enable depth-to-color registration on a supporting device.
    fn enable_depth_registration(&mut self) -> Result<()>;

    /// Block until the next frame on the stream is available.
    fn read_frame(&mut self, kind: StreamKind) -> Result<RawFrame>;

    /// Release the device. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Owned handle for the process-wide driver layer.
///
/// Construction stands in for the driver library's global init; dropping it
/// is the matching shutdown. A [`DeviceSession`](crate::capture::DeviceSession)
/// takes ownership so the layer outlives every device handle.
pub struct DriverContext {
    backend: &'static str,
}

impl DriverContext {
    pub fn initialize(backend: &'static str) -> Result<Self> {
        info!(backend, "driver layer initialized");
        Ok(Self { backend })
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

impl Drop for DriverContext {
    fn drop(&mut self) {
        info!(backend = self.backend, "driver layer shut down");
    }
}
