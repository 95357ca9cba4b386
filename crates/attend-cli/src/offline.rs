//! Offline commands that run the core directly on a recorded landmark stream.

use anyhow::Result;
use attend_core::{
    AttendanceRecord, ClassifierError, EmotionLabel, EventPipeline, FaceMetrics,
    GeometryClassifier, IdentityResolver, LandmarkSource, PipelineError, WallClock,
};
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Classification of one face in a recording.
#[derive(Debug)]
pub struct FaceReport {
    pub frame: usize,
    pub face: usize,
    pub outcome: Result<(EmotionLabel, FaceMetrics), ClassifierError>,
}

/// Classify every face of every frame without touching any log.
pub fn classify_stream(
    source: &mut dyn LandmarkSource,
    classifier: &GeometryClassifier,
) -> Result<Vec<FaceReport>> {
    let mut reports = Vec::new();
    let mut frame_idx = 0usize;
    while let Some(frame) = source.next_frame()? {
        for (face_idx, face) in frame.faces.iter().enumerate() {
            let outcome = classifier
                .measure(face)
                .map(|m| (classifier.thresholds().label(&m), m));
            reports.push(FaceReport {
                frame: frame_idx,
                face: face_idx,
                outcome,
            });
        }
        frame_idx += 1;
    }
    Ok(reports)
}

/// Wall clock anchored at a start time and advanced by the replayed stream.
///
/// Clones share the offset, so the copy handed to the pipeline follows
/// [`OffsetClock::set_offset`] calls made on any other clone.
#[derive(Clone)]
pub struct OffsetClock {
    start: NaiveDateTime,
    offset_ms: Arc<AtomicU64>,
}

impl OffsetClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            start,
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wall time `offset` after the start, if it is representable.
    pub fn at(&self, offset: Duration) -> Option<NaiveDateTime> {
        let delta = chrono::Duration::from_std(offset).ok()?;
        self.start.checked_add_signed(delta)
    }

    /// Move the clock to `offset` after the start.
    ///
    /// Returns `false` and leaves the clock unchanged when the resulting
    /// wall time is out of range.
    pub fn set_offset(&self, offset: Duration) -> bool {
        let Ok(ms) = u64::try_from(offset.as_millis()) else {
            return false;
        };
        if self.at(Duration::from_millis(ms)).is_none() {
            return false;
        }
        self.offset_ms.store(ms, Ordering::Relaxed);
        true
    }
}

impl WallClock for OffsetClock {
    fn now(&self) -> NaiveDateTime {
        let ms = self.offset_ms.load(Ordering::Relaxed);
        self.at(Duration::from_millis(ms)).unwrap_or(self.start)
    }
}

/// Counters from a replay run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub faces: usize,
    pub invalid_faces: usize,
    pub suppressed: usize,
    pub records: Vec<AttendanceRecord>,
}

/// Drive `pipeline` through a recording, using each frame's `t` as the
/// monotonic clock. Frames without `t` reuse the previous frame's time.
/// Faces of a frame whose `t` lies beyond the representable timeline are
/// counted as invalid and the clock stays where it was.
///
/// `clock` must share its offset with the pipeline's wall clock so record
/// timestamps follow the recording's timeline.
pub fn replay<R: IdentityResolver>(
    source: &mut dyn LandmarkSource,
    pipeline: &mut EventPipeline<R>,
    clock: &OffsetClock,
) -> Result<ReplaySummary> {
    let epoch = Instant::now();
    let mut offset = Duration::ZERO;
    let mut summary = ReplaySummary::default();

    while let Some(frame) = source.next_frame()? {
        summary.frames += 1;
        let next = frame.offset().unwrap_or(offset);
        let now = match epoch.checked_add(next) {
            Some(now) if clock.set_offset(next) => now,
            _ => {
                tracing::warn!(
                    frame = summary.frames - 1,
                    t = ?frame.t,
                    "frame time out of range, skipping its faces"
                );
                summary.faces += frame.faces.len();
                summary.invalid_faces += frame.faces.len();
                continue;
            }
        };
        offset = next;

        for face in &frame.faces {
            summary.faces += 1;
            match pipeline.on_detected_face(face, now) {
                Ok(Some(record)) => summary.records.push(record),
                Ok(None) => summary.suppressed += 1,
                Err(PipelineError::InvalidInput(e)) => {
                    tracing::debug!(frame = summary.frames - 1, error = %e, "skipping face");
                    summary.invalid_faces += 1;
                }
                Err(e @ PipelineError::Log(_)) => return Err(e.into()),
            }
        }
    }
    Ok(summary)
}
