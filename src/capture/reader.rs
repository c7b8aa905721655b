//! Blocking per-stream frame pull

use std::time::Instant;

use crate::capture::driver::{Result, StreamKind};
use crate::capture::frame::RawFrame;
use crate::capture::session::DeviceSession;

/// Pulls the next available frame from a started stream.
///
/// No queueing, no history: each call yields the most recent frame the driver
/// has, and the returned buffer is only meaningful until the next read on the
/// same stream. The read blocks with no timeout of its own, so a wedged
/// driver stalls the caller; cancellation happens between reads, not inside
/// one.
pub struct FrameReader<'a> {
    session: &'a mut DeviceSession,
}

impl<'a> FrameReader<'a> {
    pub fn new(session: &'a mut DeviceSession) -> Self {
        Self { session }
    }

    pub fn read(&mut self, kind: StreamKind) -> Result<RawFrame> {
        let start = Instant::now();
        let frame = self.session.read_frame(kind)?;
        metrics::histogram!("read_time_us", "stream" => kind.as_str())
            .record(start.elapsed().as_micros() as f64);
        Ok(frame)
    }
}
