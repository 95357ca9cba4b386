//! Landmark sources: per-frame face landmark sets produced by an external detector.

use crate::types::LandmarkPoint;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("landmark source I/O: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: malformed landmark frame: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Landmarks of every face detected in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture time in seconds on the source's monotonic clock, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    /// One ordered landmark sequence per detected face.
    #[serde(default)]
    pub faces: Vec<Vec<LandmarkPoint>>,
}

impl LandmarkFrame {
    /// `t` as a duration since the source's epoch; `None` if absent, negative or not finite.
    pub fn offset(&self) -> Option<Duration> {
        self.t.and_then(|t| Duration::try_from_secs_f64(t).ok())
    }
}

/// Producer of landmark frames. `Ok(None)` marks the end of the stream.
pub trait LandmarkSource {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError>;
}

/// Reads one JSON-encoded [`LandmarkFrame`] per line. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|source| SourceError::Parse {
                    line: self.line,
                    source,
                });
        }
    }
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        (**self).next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_frames_and_skips_blank_lines() {
        let input = "{\"t\": 0.5, \"faces\": [[[1, 2], [3, 4]]]}\n\n{\"faces\": []}\n";
        let mut src = JsonLinesSource::new(Cursor::new(input));

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.t, Some(0.5));
        assert_eq!(first.faces.len(), 1);
        assert_eq!(first.faces[0][1], LandmarkPoint::new(3.0, 4.0));

        let second = src.next_frame().unwrap().unwrap();
        assert_eq!(second.t, None);
        assert!(second.faces.is_empty());

        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"faces\": []}\n\nnot json\n";
        let mut src = JsonLinesSource::new(Cursor::new(input));
        src.next_frame().unwrap();

        match src.next_frame() {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_offset() {
        let frame = |t| LandmarkFrame { t, faces: Vec::new() };
        assert_eq!(frame(Some(1.5)).offset(), Some(Duration::from_millis(1500)));
        assert_eq!(frame(Some(-1.0)).offset(), None);
        assert_eq!(frame(Some(f64::NAN)).offset(), None);
        assert_eq!(frame(None).offset(), None);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            JsonLinesSource::open("/nonexistent/landmarks.jsonl"),
            Err(SourceError::Io(_))
        ));
    }
}
