//! Synthetic camera driver: deterministic frames, injectable faults
//!
//! Reference [`CameraDriver`] used by the binary (`source = "synthetic"`) and
//! the test suite. Real device stacks live behind the same trait out of tree.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::capture::driver::{CameraDriver, DriverError, Result, StreamKind, VideoMode};
use crate::capture::frame::{PixelFormat, RawFrame};

#[derive(Default)]
struct StreamState {
    created: bool,
    mode: Option<VideoMode>,
    started: bool,
    reads: u64,
    /// Read indices that deliver an empty buffer
    dropouts: HashSet<u64>,
    /// Read indices that fail outright
    failures: HashSet<u64>,
}

/// Deterministic in-memory camera.
///
/// Depth pixels follow a `base + x + y + frame` gradient in millimeters,
/// color pixels encode their coordinates and frame index, so tests can assert
/// exact values. Dropouts and read failures are injected per stream by read
/// index.
pub struct SyntheticCamera {
    open: bool,
    depth: StreamState,
    color: StreamState,
    registration_supported: bool,
    registration_enabled: bool,
    /// Sleep one frame interval per read, for live runs
    paced: bool,
}

const DEPTH_BASE_MM: u16 = 500;

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            open: false,
            depth: StreamState::default(),
            color: StreamState::default(),
            registration_supported: true,
            registration_enabled: false,
            paced: false,
        }
    }

    /// Deliver empty color buffers at the given read indices
    pub fn with_color_dropouts(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.color.dropouts = indices.into_iter().collect();
        self
    }

    /// Deliver empty depth buffers at the given read indices
    pub fn with_depth_dropouts(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.depth.dropouts = indices.into_iter().collect();
        self
    }

    /// Fail reads on a stream at the given read indices
    pub fn with_read_failures(
        mut self,
        kind: StreamKind,
        indices: impl IntoIterator<Item = u64>,
    ) -> Self {
        self.state_mut(kind).failures = indices.into_iter().collect();
        self
    }

    pub fn without_registration(mut self) -> Self {
        self.registration_supported = false;
        self
    }

    /// Pace reads at the configured frame rate instead of returning
    /// immediately. Used by live runs, never by tests.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    pub fn registration_enabled(&self) -> bool {
        self.registration_enabled
    }

    fn state(&self, kind: StreamKind) -> &StreamState {
        match kind {
            StreamKind::Depth => &self.depth,
            StreamKind::Color => &self.color,
        }
    }

    fn state_mut(&mut self, kind: StreamKind) -> &mut StreamState {
        match kind {
            StreamKind::Depth => &mut self.depth,
            StreamKind::Color => &mut self.color,
        }
    }

    fn render(mode: &VideoMode, seq: u64) -> Bytes {
        let (w, h) = (mode.width as usize, mode.height as usize);
        let mut buf = Vec::with_capacity(w * h * mode.format.bytes_per_pixel());
        for y in 0..h {
            for x in 0..w {
                // Mirroring flips horizontally, like the hardware flag would
                let sx = if mode.mirroring { w - 1 - x } else { x };
                match mode.format {
                    PixelFormat::Depth1Mm => {
                        let mm = DEPTH_BASE_MM as u64 + sx as u64 + y as u64 + seq;
                        buf.extend_from_slice(&(mm as u16).to_le_bytes());
                    }
                    PixelFormat::Rgb888 | PixelFormat::Bgr888 => {
                        buf.extend_from_slice(&[sx as u8, y as u8, seq as u8]);
                    }
                }
            }
        }
        Bytes::from(buf)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for SyntheticCamera {
    fn open(&mut self, _uri: Option<&str>) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn create_stream(&mut self, kind: StreamKind) -> Result<()> {
        if !self.open {
            return Err(DriverError::StreamCreate(kind, "device not open".into()));
        }
        self.state_mut(kind).created = true;
        Ok(())
    }

    fn set_video_mode(&mut self, kind: StreamKind, mode: &VideoMode) -> Result<()> {
        let state = self.state_mut(kind);
        if !state.created {
            return Err(DriverError::Configuration(kind, "stream not created".into()));
        }
        if mode.width == 0 || mode.height == 0 || mode.fps == 0 {
            return Err(DriverError::Configuration(kind, "degenerate mode".into()));
        }
        state.mode = Some(mode.clone());
        Ok(())
    }

    fn start_stream(&mut self, kind: StreamKind) -> Result<()> {
        let state = self.state_mut(kind);
        if state.mode.is_none() {
            return Err(DriverError::StreamStart(kind, "no video mode set".into()));
        }
        state.started = true;
        Ok(())
    }

    fn stop_stream(&mut self, kind: StreamKind) {
        self.state_mut(kind).started = false;
    }

    fn stream_valid(&self, kind: StreamKind) -> bool {
        self.state(kind).started
    }

    fn supports_depth_registration(&self) -> bool {
        self.registration_supported
    }

    fn enable_depth_registration(&mut self) -> Result<()> {
        if !self.registration_supported {
            return Err(DriverError::Configuration(
                StreamKind::Depth,
                "registration unsupported".into(),
            ));
        }
        self.registration_enabled = true;
        Ok(())
    }

    fn read_frame(&mut self, kind: StreamKind) -> Result<RawFrame> {
        let paced = self.paced;
        let state = self.state_mut(kind);
        if !state.started {
            return Err(DriverError::Read(kind, "stream not started".into()));
        }
        // mode presence is guaranteed once started
        let mode = state.mode.clone().expect("started stream has a mode");
        let seq = state.reads;
        state.reads += 1;

        if state.failures.contains(&seq) {
            return Err(DriverError::Read(kind, format!("injected failure at frame {seq}")));
        }

        if paced {
            thread::sleep(Duration::from_secs(1) / mode.fps);
        }

        let data = if state.dropouts.contains(&seq) {
            Bytes::new()
        } else {
            Self::render(&mode, seq)
        };

        Ok(RawFrame {
            width: mode.width,
            height: mode.height,
            format: mode.format,
            data,
            device_timestamp: Some(Duration::from_secs(seq) / mode.fps),
        })
    }

    fn close(&mut self) {
        self.open = false;
        self.depth = StreamState::default();
        self.color = StreamState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(mode: VideoMode) -> SyntheticCamera {
        let mut cam = SyntheticCamera::new();
        cam.open(None).unwrap();
        cam.create_stream(StreamKind::Depth).unwrap();
        cam.set_video_mode(StreamKind::Depth, &mode).unwrap();
        cam.start_stream(StreamKind::Depth).unwrap();
        cam
    }

    #[test]
    fn frame_matches_configured_resolution() {
        for (w, h) in [(320, 240), (640, 480), (4, 3)] {
            let mode = VideoMode {
                width: w,
                height: h,
                ..VideoMode::depth_default()
            };
            let mut cam = started(mode);
            let frame = cam.read_frame(StreamKind::Depth).unwrap();
            assert_eq!((frame.width, frame.height), (w, h));
            assert_eq!(frame.data.len(), frame.expected_len());
        }
    }

    #[test]
    fn depth_gradient_is_deterministic() {
        let mut cam = started(VideoMode::depth_default());
        let f0 = cam.read_frame(StreamKind::Depth).unwrap();
        let f1 = cam.read_frame(StreamKind::Depth).unwrap();
        // (x=3, y=2) on frames 0 and 1
        let i = (2 * 320 + 3) * 2;
        let at = |f: &RawFrame| u16::from_le_bytes([f.data[i], f.data[i + 1]]);
        assert_eq!(at(&f0), DEPTH_BASE_MM + 3 + 2);
        assert_eq!(at(&f1), DEPTH_BASE_MM + 3 + 2 + 1);
    }

    #[test]
    fn mirroring_flips_horizontally() {
        let plain = started(VideoMode::depth_default())
            .read_frame(StreamKind::Depth)
            .unwrap();
        let mirrored = started(VideoMode {
            mirroring: true,
            ..VideoMode::depth_default()
        })
        .read_frame(StreamKind::Depth)
        .unwrap();
        let at = |f: &RawFrame, x: usize| u16::from_le_bytes([f.data[x * 2], f.data[x * 2 + 1]]);
        assert_eq!(at(&plain, 0), at(&mirrored, 319));
        assert_eq!(at(&plain, 319), at(&mirrored, 0));
    }

    #[test]
    fn mode_must_be_set_before_start() {
        let mut cam = SyntheticCamera::new();
        cam.open(None).unwrap();
        cam.create_stream(StreamKind::Color).unwrap();
        assert!(matches!(
            cam.start_stream(StreamKind::Color),
            Err(DriverError::StreamStart(StreamKind::Color, _))
        ));
    }

    #[test]
    fn injected_faults_fire_at_their_index() {
        let mut cam = SyntheticCamera::new()
            .with_depth_dropouts([1])
            .with_read_failures(StreamKind::Depth, [2]);
        cam.open(None).unwrap();
        cam.create_stream(StreamKind::Depth).unwrap();
        cam.set_video_mode(StreamKind::Depth, &VideoMode::depth_default())
            .unwrap();
        cam.start_stream(StreamKind::Depth).unwrap();

        assert!(!cam.read_frame(StreamKind::Depth).unwrap().data.is_empty());
        assert!(cam.read_frame(StreamKind::Depth).unwrap().data.is_empty());
        assert!(cam.read_frame(StreamKind::Depth).is_err());
        assert!(!cam.read_frame(StreamKind::Depth).unwrap().data.is_empty());
    }
}
