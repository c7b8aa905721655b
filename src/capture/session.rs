//! Device session: lifecycle of one camera and its depth/color streams

use tracing::{info, warn};

use crate::capture::driver::{CameraDriver, DriverContext, DriverError, Result, StreamKind, VideoMode};
use crate::capture::frame::RawFrame;

/// Outcome of the best-effort depth-to-color registration request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    NotRequested,
    Enabled,
    Unsupported,
    Failed,
}

/// Owns a device handle plus its two streams.
///
/// Streams are children of the device: they are created and started through
/// the session and stopped before the device is released. `close` runs on
/// every exit path exactly once, `Drop` covers the paths that skip it.
pub struct DeviceSession {
    driver: Box<dyn CameraDriver>,
    // Held so the driver layer outlives the device handle
    _ctx: DriverContext,
    started: Vec<StreamKind>,
    registration: RegistrationState,
    closed: bool,
}

impl DeviceSession {
    /// Open a device. `uri: None` selects any available device.
    pub fn open(
        ctx: DriverContext,
        mut driver: Box<dyn CameraDriver>,
        uri: Option<&str>,
    ) -> Result<Self> {
        driver.open(uri)?;
        info!(device = uri.unwrap_or("any"), "device opened");
        Ok(Self {
            driver,
            _ctx: ctx,
            started: Vec::new(),
            registration: RegistrationState::NotRequested,
            closed: false,
        })
    }

    /// Create the stream and apply its video mode. Must precede `start`.
    pub fn configure_stream(&mut self, kind: StreamKind, mode: &VideoMode) -> Result<()> {
        self.ensure_open()?;
        self.driver.create_stream(kind)?;
        self.driver.set_video_mode(kind, mode)?;
        info!(
            stream = kind.as_str(),
            width = mode.width,
            height = mode.height,
            fps = mode.fps,
            "stream configured"
        );
        Ok(())
    }

    /// Begin frame delivery on a configured stream.
    pub fn start(&mut self, kind: StreamKind) -> Result<()> {
        self.ensure_open()?;
        self.driver.start_stream(kind)?;
        if !self.started.contains(&kind) {
            self.started.push(kind);
        }
        info!(stream = kind.as_str(), "stream started");
        Ok(())
    }

    /// Post-start health check over both streams. The only fatal startup
    /// condition: callers abort when this is false.
    pub fn streams_valid(&self) -> bool {
        self.driver.stream_valid(StreamKind::Depth) && self.driver.stream_valid(StreamKind::Color)
    }

    /// Align depth pixels to the color frame if the device can.
    ///
    /// Best-effort: unsupported devices get a recorded skip, a refused enable
    /// is logged and ignored. Never fatal.
    pub fn enable_depth_to_color_registration(&mut self) -> RegistrationState {
        self.registration = if !self.driver.supports_depth_registration() {
            info!("depth-to-color registration unsupported, skipping");
            RegistrationState::Unsupported
        } else {
            match self.driver.enable_depth_registration() {
                Ok(()) => {
                    info!("depth-to-color registration enabled");
                    RegistrationState::Enabled
                }
                Err(e) => {
                    warn!(error = %e, "depth-to-color registration failed");
                    RegistrationState::Failed
                }
            }
        };
        self.registration
    }

    pub fn registration(&self) -> RegistrationState {
        self.registration
    }

    /// Block until the next frame on a started stream.
    pub(crate) fn read_frame(&mut self, kind: StreamKind) -> Result<RawFrame> {
        self.ensure_open()?;
        if !self.started.contains(&kind) {
            return Err(DriverError::StreamNotStarted(kind));
        }
        self.driver.read_frame(kind)
    }

    /// Stop both streams and release the device. Idempotent; also invoked
    /// from `Drop` so early-error paths release hardware too.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for kind in self.started.drain(..) {
            self.driver.stop_stream(kind);
        }
        self.driver.close();
        self.closed = true;
        info!("device session closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{PixelFormat, RawFrame};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock driver counting lifecycle calls
    struct MockDriver {
        closes: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        supports_registration: bool,
    }

    impl CameraDriver for MockDriver {
        fn open(&mut self, _uri: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn create_stream(&mut self, _kind: StreamKind) -> Result<()> {
            Ok(())
        }
        fn set_video_mode(&mut self, _kind: StreamKind, _mode: &VideoMode) -> Result<()> {
            Ok(())
        }
        fn start_stream(&mut self, _kind: StreamKind) -> Result<()> {
            Ok(())
        }
        fn stop_stream(&mut self, _kind: StreamKind) {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
        fn stream_valid(&self, _kind: StreamKind) -> bool {
            true
        }
        fn supports_depth_registration(&self) -> bool {
            self.supports_registration
        }
        fn enable_depth_registration(&mut self) -> Result<()> {
            Ok(())
        }
        fn read_frame(&mut self, kind: StreamKind) -> Result<RawFrame> {
            Ok(RawFrame {
                width: 2,
                height: 2,
                format: match kind {
                    StreamKind::Depth => PixelFormat::Depth1Mm,
                    StreamKind::Color => PixelFormat::Rgb888,
                },
                data: Bytes::new(),
                device_timestamp: None,
            })
        }
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn session(supports_registration: bool) -> (DeviceSession, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let driver = MockDriver {
            closes: closes.clone(),
            stops: stops.clone(),
            supports_registration,
        };
        let ctx = DriverContext::initialize("mock").unwrap();
        let session = DeviceSession::open(ctx, Box::new(driver), None).unwrap();
        (session, closes, stops)
    }

    #[test]
    fn read_before_start_is_rejected() {
        let (mut session, _, _) = session(true);
        session
            .configure_stream(StreamKind::Depth, &VideoMode::depth_default())
            .unwrap();
        let err = session.read_frame(StreamKind::Depth).unwrap_err();
        assert!(matches!(err, DriverError::StreamNotStarted(StreamKind::Depth)));

        session.start(StreamKind::Depth).unwrap();
        assert!(session.read_frame(StreamKind::Depth).is_ok());
    }

    #[test]
    fn close_runs_exactly_once_and_stops_started_streams() {
        let (mut session, closes, stops) = session(true);
        session
            .configure_stream(StreamKind::Depth, &VideoMode::depth_default())
            .unwrap();
        session
            .configure_stream(StreamKind::Color, &VideoMode::color_default())
            .unwrap();
        session.start(StreamKind::Depth).unwrap();
        session.start(StreamKind::Color).unwrap();

        session.close();
        session.close();
        drop(session);

        assert_eq!(closes.load(Ordering::Relaxed), 1);
        assert_eq!(stops.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn drop_closes_unclosed_session() {
        let (session, closes, _) = session(true);
        drop(session);
        assert_eq!(closes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn registration_skip_is_recorded() {
        let (mut session, _, _) = session(false);
        assert_eq!(
            session.enable_depth_to_color_registration(),
            RegistrationState::Unsupported
        );
        assert_eq!(session.registration(), RegistrationState::Unsupported);

        let (mut session, _, _) = self::session(true);
        assert_eq!(
            session.enable_depth_to_color_registration(),
            RegistrationState::Enabled
        );
    }

    #[test]
    fn operations_after_close_fail() {
        let (mut session, _, _) = session(true);
        session.close();
        assert!(matches!(
            session.configure_stream(StreamKind::Depth, &VideoMode::depth_default()),
            Err(DriverError::SessionClosed)
        ));
    }
}
