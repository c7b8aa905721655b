//! The acquisition loop: read, adapt, gate, forward

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::adapter::{adapt_color, adapt_depth, ColorImage, DepthImage};
use crate::capture::driver::{Result, StreamKind};
use crate::capture::reader::FrameReader;
use crate::capture::session::DeviceSession;
use crate::tracking::TrackingConsumer;
use crate::PipelineConfig;

/// Policy for a failed stream read.
///
/// `Skip` reproduces the classic log-and-continue front-end behavior; note
/// that with `Skip` a persistently failing device spins forever unless
/// `max_frames` or cancellation bounds the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnReadError {
    Skip,
    Abort,
}

/// Cooperative cancellation flag, polled once per loop iteration.
///
/// There is no mid-iteration cancellation: a blocking read in progress
/// finishes (or hangs) before the flag is seen.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One adapted depth/color pair as handed to the tracking consumer
#[derive(Debug, Clone)]
pub struct FramePair {
    pub color: ColorImage,
    pub depth: DepthImage,
    /// Advances by one per loop iteration, admitted or not
    pub sequence: u64,
    /// Capture timestamp, elapsed since the pipeline started, sampled before
    /// the depth read of this iteration
    pub timestamp: Duration,
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub iterations: u64,
    pub forwarded: u64,
    pub skipped_invalid: u64,
    pub read_errors: u64,
}

/// Drives the synchronous acquire-adapt-forward loop on the calling thread.
///
/// Per iteration: poll cancellation, read depth then color (sequentially; the
/// two frames carry no hardware-level alignment guarantee), adapt both, admit
/// only pairs where both images are valid, submit to the consumer. The
/// sequence index advances every iteration regardless of admission.
pub struct PipelineDriver {
    policy: OnReadError,
    max_frames: Option<u64>,
    cancel: CancelToken,
}

impl PipelineDriver {
    pub fn new(config: &PipelineConfig, cancel: CancelToken) -> Self {
        Self {
            policy: config.on_read_error,
            max_frames: config.max_frames,
            cancel,
        }
    }

    /// Run until cancellation, the `max_frames` bound, or (with
    /// [`OnReadError::Abort`]) the first read failure.
    pub fn run(
        &mut self,
        session: &mut DeviceSession,
        consumer: &mut dyn TrackingConsumer,
    ) -> Result<PipelineStats> {
        let started = Instant::now();
        let mut stats = PipelineStats::default();
        let mut reader = FrameReader::new(session);

        info!("processing started");
        'frames: loop {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping");
                break;
            }
            if let Some(max) = self.max_frames {
                if stats.iterations >= max {
                    info!(frames = max, "frame bound reached, stopping");
                    break;
                }
            }

            let sequence = stats.iterations;
            stats.iterations += 1;
            let timestamp = started.elapsed();

            let mut raw = [None, None];
            for (slot, kind) in raw.iter_mut().zip([StreamKind::Depth, StreamKind::Color]) {
                match reader.read(kind) {
                    Ok(frame) => *slot = Some(frame),
                    Err(e) => {
                        stats.read_errors += 1;
                        metrics::counter!("read_errors").increment(1);
                        match self.policy {
                            OnReadError::Skip => {
                                warn!(sequence, error = %e, "read failed, skipping iteration");
                                continue 'frames;
                            }
                            OnReadError::Abort => {
                                warn!(sequence, error = %e, "read failed, aborting");
                                return Err(e);
                            }
                        }
                    }
                }
            }
            let [Some(raw_depth), Some(raw_color)] = raw else {
                unreachable!("both reads succeeded")
            };

            let depth = adapt_depth(&raw_depth);
            let color = adapt_color(&raw_color);
            if !depth.is_valid() || !color.is_valid() {
                stats.skipped_invalid += 1;
                metrics::counter!("frames_skipped").increment(1);
                debug!(sequence, "frame pair missing data, skipping");
                continue;
            }

            consumer.submit(FramePair {
                color,
                depth,
                sequence,
                timestamp,
            });
            stats.forwarded += 1;
            metrics::counter!("frames_forwarded").increment(1);
        }

        info!(
            iterations = stats.iterations,
            forwarded = stats.forwarded,
            skipped = stats.skipped_invalid,
            read_errors = stats.read_errors,
            "processing finished"
        );
        Ok(stats)
    }
}
