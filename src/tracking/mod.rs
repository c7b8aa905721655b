//! Tracking consumer port and the reference trajectory recorder
//!
//! The visual tracking engine (feature extraction, pose estimation, mapping)
//! is an external collaborator. The pipeline talks to it through
//! [`TrackingConsumer`]; [`TrajectoryRecorder`] is the in-tree implementation
//! used for wiring and tests, recording one pose per submitted pair.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::pipeline::FramePair;

/// Camera pose: translation plus unit quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Synchronous port to the tracking engine.
///
/// `submit` may block until the consumer has ingested the pair; the pipeline
/// does not manage any consumer-side threading. `shutdown` must stop all
/// internal background activity and is called strictly before either export,
/// so exports never observe concurrent mutation.
pub trait TrackingConsumer: Send {
    /// Feed one adapted frame pair for tracking.
    fn submit(&mut self, pair: FramePair);

    /// Stop background activity. Submissions after this are ignored.
    fn shutdown(&mut self);

    /// Write one record per processed frame to a flat text file.
    fn export_trajectory(&self, path: &Path) -> io::Result<()>;

    /// Write one record per retained keyframe to a flat text file.
    fn export_keyframes(&self, path: &Path) -> io::Result<()>;
}

/// One exported trajectory row
#[derive(Debug, Clone)]
pub struct TrajectoryRecord {
    pub sequence: u64,
    pub timestamp: Duration,
    pub pose: Pose,
    pub keyframe: bool,
}

/// Records every submitted pair and exports the accumulated trajectory.
///
/// Stands in for the external engine: poses stay at identity, and every Nth
/// submission is retained as a keyframe. Row layout is
/// `timestamp sequence tx ty tz qx qy qz qw`, whitespace-separated.
pub struct TrajectoryRecorder {
    vocabulary: PathBuf,
    keyframe_interval: u64,
    records: Vec<TrajectoryRecord>,
    stopped: bool,
}

impl TrajectoryRecorder {
    pub fn new(vocabulary: PathBuf, keyframe_interval: u64) -> Self {
        if !vocabulary.exists() {
            warn!(path = %vocabulary.display(), "vocabulary resource not found");
        }
        Self {
            vocabulary,
            keyframe_interval: keyframe_interval.max(1),
            records: Vec::new(),
            stopped: false,
        }
    }

    pub fn vocabulary(&self) -> &Path {
        &self.vocabulary
    }

    pub fn records(&self) -> &[TrajectoryRecord] {
        &self.records
    }

    fn export(&self, path: &Path, keyframes_only: bool) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for rec in &self.records {
            if keyframes_only && !rec.keyframe {
                continue;
            }
            let [tx, ty, tz] = rec.pose.translation;
            let [qx, qy, qz, qw] = rec.pose.rotation;
            writeln!(
                out,
                "{:.6} {} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
                rec.timestamp.as_secs_f64(),
                rec.sequence,
                tx,
                ty,
                tz,
                qx,
                qy,
                qz,
                qw
            )?;
        }
        out.flush()
    }
}

impl TrackingConsumer for TrajectoryRecorder {
    fn submit(&mut self, pair: FramePair) {
        if self.stopped {
            // late submissions race shutdown; drop them so exports stay stable
            return;
        }
        let keyframe = self.records.len() as u64 % self.keyframe_interval == 0;
        self.records.push(TrajectoryRecord {
            sequence: pair.sequence,
            timestamp: pair.timestamp,
            pose: Pose::identity(),
            keyframe,
        });
    }

    fn shutdown(&mut self) {
        if !self.stopped {
            self.stopped = true;
            info!(frames = self.records.len(), "tracking consumer stopped");
        }
    }

    fn export_trajectory(&self, path: &Path) -> io::Result<()> {
        self.export(path, false)
    }

    fn export_keyframes(&self, path: &Path) -> io::Result<()> {
        self.export(path, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::adapter::{adapt_color, adapt_depth};
    use crate::capture::frame::{PixelFormat, RawFrame};
    use bytes::Bytes;

    fn pair(sequence: u64) -> FramePair {
        let depth = RawFrame {
            width: 2,
            height: 2,
            format: PixelFormat::Depth1Mm,
            data: Bytes::from(vec![0u8; 8]),
            device_timestamp: None,
        };
        let color = RawFrame {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb888,
            data: Bytes::from(vec![0u8; 12]),
            device_timestamp: None,
        };
        FramePair {
            depth: adapt_depth(&depth),
            color: adapt_color(&color),
            sequence,
            timestamp: Duration::from_millis(sequence * 33),
        }
    }

    fn recorder_with(n: u64, interval: u64) -> TrajectoryRecorder {
        let mut rec = TrajectoryRecorder::new(PathBuf::from("vocab.bin"), interval);
        for i in 0..n {
            rec.submit(pair(i));
        }
        rec
    }

    #[test]
    fn keyframes_follow_interval() {
        let rec = recorder_with(7, 3);
        let kf: Vec<u64> = rec
            .records()
            .iter()
            .filter(|r| r.keyframe)
            .map(|r| r.sequence)
            .collect();
        assert_eq!(kf, vec![0, 3, 6]);
    }

    #[test]
    fn submissions_after_shutdown_are_dropped() {
        let mut rec = recorder_with(3, 10);
        rec.shutdown();
        rec.submit(pair(99));
        rec.shutdown();
        assert_eq!(rec.records().len(), 3);
    }

    #[test]
    fn export_writes_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let all = dir.path().join("trajectory.txt");
        let kf = dir.path().join("keyframes.txt");

        let mut rec = recorder_with(5, 2);
        rec.shutdown();
        rec.export_trajectory(&all).unwrap();
        rec.export_keyframes(&kf).unwrap();

        let all = std::fs::read_to_string(&all).unwrap();
        let rows: Vec<&str> = all.lines().collect();
        assert_eq!(rows.len(), 5);
        for row in &rows {
            let cols: Vec<&str> = row.split_whitespace().collect();
            assert_eq!(cols.len(), 9);
            cols[0].parse::<f64>().unwrap();
            cols[1].parse::<u64>().unwrap();
        }
        // identity pose
        assert!(rows[0].ends_with("0.000000 0.000000 0.000000 1.000000"));

        let kf = std::fs::read_to_string(&kf).unwrap();
        assert_eq!(kf.lines().count(), 3); // sequences 0, 2, 4
    }

    #[test]
    fn export_to_unwritable_path_reports_io_error() {
        let rec = recorder_with(1, 1);
        let missing = Path::new("/nonexistent-dir/trajectory.txt");
        assert!(rec.export_trajectory(missing).is_err());
    }
}
