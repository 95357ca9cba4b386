use attend_core::{EventPipeline, JsonLinesSource, LandmarkSource, PlaceholderResolver, SourceError};
use serde::Serialize;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("source {name}: {source}")]
    Source {
        name: String,
        #[source]
        source: SourceError,
    },
    #[error("failed to spawn producer thread for {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Boxed landmark source that can move onto a producer thread.
pub type BoxedSource = Box<dyn LandmarkSource + Send>;

#[derive(Default)]
struct SourceStats {
    frames: AtomicU64,
    faces: AtomicU64,
    events: AtomicU64,
    errors: AtomicU64,
    finished: AtomicBool,
}

/// Point-in-time counters for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub frames: u64,
    pub faces: u64,
    pub events: u64,
    pub errors: u64,
    pub finished: bool,
}

/// Clone-safe handle to a producer thread's counters.
#[derive(Clone)]
pub struct SourceHandle {
    name: String,
    stats: Arc<SourceStats>,
}

impl SourceHandle {
    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            name: self.name.clone(),
            frames: self.stats.frames.load(Ordering::Relaxed),
            faces: self.stats.faces.load(Ordering::Relaxed),
            events: self.stats.events.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            finished: self.stats.finished.load(Ordering::Relaxed),
        }
    }
}

/// Open a configured source: `-` is stdin, anything else a JSONL file path.
pub fn open_source(name: &str) -> Result<BoxedSource, EngineError> {
    if name == "-" {
        return Ok(Box::new(JsonLinesSource::new(BufReader::new(std::io::stdin()))));
    }
    let source = JsonLinesSource::open(name).map_err(|source| EngineError::Source {
        name: name.to_string(),
        source,
    })?;
    Ok(Box::new(source))
}

/// Spawn a producer thread that drives `pipeline` with frames from `source`.
///
/// The thread runs until the source ends or fails with an I/O error.
/// Malformed frames and storage failures are counted and logged; the loop
/// keeps going so the next frame can retry.
pub fn spawn_source(
    name: &str,
    source: BoxedSource,
    pipeline: EventPipeline<PlaceholderResolver>,
) -> Result<SourceHandle, EngineError> {
    let stats = Arc::new(SourceStats::default());
    let handle = SourceHandle {
        name: name.to_string(),
        stats: Arc::clone(&stats),
    };

    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(format!("attend-source-{name}"))
        .spawn(move || run_source(&thread_name, source, pipeline, &stats))
        .map_err(|source| EngineError::Spawn {
            name: name.to_string(),
            source,
        })?;

    Ok(handle)
}

fn run_source(
    name: &str,
    mut source: BoxedSource,
    mut pipeline: EventPipeline<PlaceholderResolver>,
    stats: &SourceStats,
) {
    tracing::info!(source = name, "producer thread started");

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e @ SourceError::Parse { .. }) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(source = name, error = %e, "skipping malformed frame");
                continue;
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(source = name, error = %e, "landmark source failed");
                break;
            }
        };

        stats.frames.fetch_add(1, Ordering::Relaxed);
        stats
            .faces
            .fetch_add(frame.faces.len() as u64, Ordering::Relaxed);

        match pipeline.on_frame(&frame.faces, Instant::now()) {
            Ok(records) => {
                stats
                    .events
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(source = name, error = %e, "attendance append failed; will retry");
            }
        }
    }

    stats.finished.store(true, Ordering::Relaxed);
    tracing::info!(source = name, "producer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::{AttendanceLog, CooldownGate, GeometryClassifier};
    use std::io::Cursor;
    use std::time::Duration;

    fn face_json(mouth_open: bool) -> String {
        // iBUG-68 face: eyes 20 px wide and 6 px tall (EAR 0.3), mouth 40 px wide.
        let mut pts: Vec<(f32, f32)> = (0..68).map(|i| (i as f32, 0.0)).collect();
        for (base, x0) in [(36usize, 60.0f32), (42, 120.0)] {
            pts[base] = (x0, 100.0);
            pts[base + 1] = (x0 + 5.0, 97.0);
            pts[base + 2] = (x0 + 15.0, 97.0);
            pts[base + 3] = (x0 + 20.0, 100.0);
            pts[base + 4] = (x0 + 15.0, 103.0);
            pts[base + 5] = (x0 + 5.0, 103.0);
        }
        let h = if mouth_open { 7.0 } else { 1.0 };
        pts[48] = (80.0, 200.0);
        pts[50] = (90.0, 200.0 - h);
        pts[52] = (110.0, 200.0 - h);
        pts[54] = (120.0, 200.0);
        pts[56] = (110.0, 200.0 + h);
        pts[58] = (90.0, 200.0 + h);
        pts[2] = (20.0, 180.0);
        serde_json::to_string(&pts).unwrap()
    }

    fn wait_finished(handle: &SourceHandle) -> SourceStatus {
        for _ in 0..200 {
            let status = handle.status();
            if status.finished {
                return status;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("producer thread did not finish");
    }

    #[test]
    fn test_source_thread_records_one_event_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AttendanceLog::open(dir.path().join("a.csv")).unwrap());
        let input = format!(
            "{{\"faces\": [{}]}}\nnot json\n{{\"faces\": [{}]}}\n{{\"faces\": []}}\n",
            face_json(true),
            face_json(false)
        );
        let pipeline = EventPipeline::new(
            GeometryClassifier::default(),
            PlaceholderResolver::default(),
            CooldownGate::default(),
            Arc::clone(&log),
        );

        let handle = spawn_source(
            "test",
            Box::new(JsonLinesSource::new(Cursor::new(input))),
            pipeline,
        )
        .unwrap();
        let status = wait_finished(&handle);

        assert_eq!(status.frames, 3);
        assert_eq!(status.faces, 2);
        assert_eq!(status.events, 1);
        assert_eq!(status.errors, 1);

        let pending = log.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].emotion, attend_core::EmotionLabel::Happy);
    }

    #[test]
    fn test_open_missing_source_fails_fast() {
        let err = open_source("/nonexistent/cam0.jsonl").err().unwrap();
        assert!(err.to_string().contains("/nonexistent/cam0.jsonl"));
    }
}
