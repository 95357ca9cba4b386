//! Per-face event pipeline: classify → gate → log.

use crate::classifier::{ClassifierError, GeometryClassifier};
use crate::cooldown::CooldownGate;
use crate::identity::IdentityResolver;
use crate::store::{AttendanceLog, LogError};
use crate::types::{AttendanceRecord, LandmarkPoint};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid landmarks: {0}")]
    InvalidInput(#[from] ClassifierError),
    #[error("storage error: {0}")]
    Log(#[from] LogError),
}

/// Source of the wall-clock time stamped onto records.
pub trait WallClock: Send {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Turns detected faces into deduplicated attendance records.
///
/// One pipeline serves one landmark source and owns that source's cooldown
/// state. The log may be shared between pipelines and readers.
pub struct EventPipeline<R> {
    classifier: GeometryClassifier,
    resolver: R,
    gate: CooldownGate,
    log: Arc<AttendanceLog>,
    clock: Box<dyn WallClock>,
}

impl<R: IdentityResolver> EventPipeline<R> {
    pub fn new(
        classifier: GeometryClassifier,
        resolver: R,
        gate: CooldownGate,
        log: Arc<AttendanceLog>,
    ) -> Self {
        Self {
            classifier,
            resolver,
            gate,
            log,
            clock: Box::new(LocalClock),
        }
    }

    /// Replace the wall clock used for record timestamps.
    pub fn with_clock(mut self, clock: impl WallClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Process one detected face observed at monotonic time `now`.
    ///
    /// Returns the appended record, or `None` when the identity is still
    /// cooling down. The gate only advances after the append succeeded, so a
    /// storage failure leaves the event to be retried on a later frame.
    pub fn on_detected_face(
        &mut self,
        landmarks: &[LandmarkPoint],
        now: Instant,
    ) -> Result<Option<AttendanceRecord>, PipelineError> {
        let emotion = self.classifier.classify(landmarks)?;
        let identity = self.resolver.resolve(landmarks);

        if !self.gate.is_open(&identity, now) {
            tracing::debug!(
                identity = %identity,
                remaining = ?self.gate.remaining(&identity, now),
                "event suppressed by cooldown"
            );
            return Ok(None);
        }

        let record = AttendanceRecord::pending(identity, self.clock.now(), emotion);
        self.log.append(&record)?;
        self.gate.record(&record.identity, now);

        tracing::info!(
            identity = %record.identity,
            timestamp = %record.timestamp,
            emotion = %record.emotion,
            "attendance event recorded"
        );
        Ok(Some(record))
    }

    /// Process every face of one frame in order.
    ///
    /// Faces with unusable landmarks are skipped; a storage failure aborts
    /// the rest of the frame.
    pub fn on_frame(
        &mut self,
        faces: &[Vec<LandmarkPoint>],
        now: Instant,
    ) -> Result<Vec<AttendanceRecord>, LogError> {
        let mut emitted = Vec::new();
        for (i, face) in faces.iter().enumerate() {
            match self.on_detected_face(face, now) {
                Ok(Some(record)) => emitted.push(record),
                Ok(None) => {}
                Err(PipelineError::InvalidInput(e)) => {
                    tracing::debug!(face = i, error = %e, "skipping face");
                }
                Err(PipelineError::Log(e)) => return Err(e),
            }
        }
        Ok(emitted)
    }
}
