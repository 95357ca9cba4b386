//! Append-only CSV attendance log.
//!
//! Rows are appended with a single write; status transitions rewrite the
//! whole table into a sibling temp file and atomically rename it over the
//! log. An in-process mutex serializes every operation, so a confirm can
//! never drop a concurrent append and readers never see a partial row.

use crate::types::{AttendanceRecord, AttendanceStatus};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Column order of the log file.
pub const LOG_HEADER: [&str; 4] = ["identity", "timestamp", "status", "emotion"];

#[derive(Error, Debug)]
pub enum LogError {
    #[error("attendance log I/O: {0}")]
    Io(#[from] io::Error),
    #[error("attendance log csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("attendance log {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Durable attendance record store backed by a flat CSV file.
pub struct AttendanceLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AttendanceLog {
    /// Open the log at `path`, creating it with the canonical header if absent.
    ///
    /// An existing file must carry the canonical header and parse cleanly;
    /// anything else is reported as [`LogError::Corrupt`] instead of being
    /// overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let log = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };

        if let Some(dir) = log.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        if log.ensure_header()? {
            tracing::info!(path = %log.path.display(), "created attendance log");
        } else {
            let rows = log.read_rows()?;
            tracing::info!(
                path = %log.path.display(),
                rows = rows.len(),
                pending = rows.iter().filter(|r| r.is_pending()).count(),
                "opened attendance log"
            );
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as a new pending row.
    pub fn append(&self, record: &AttendanceRecord) -> Result<(), LogError> {
        let _guard = self.lock.lock();
        self.ensure_header()?;

        let row = AttendanceRecord {
            status: AttendanceStatus::Pending,
            ..record.clone()
        };
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.serialize(&row)?;
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        tracing::debug!(
            identity = %row.identity,
            timestamp = %row.timestamp,
            emotion = %row.emotion,
            "attendance row appended"
        );
        Ok(())
    }

    /// All pending records, in append order.
    pub fn list_pending(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let _guard = self.lock.lock();
        Ok(self
            .read_rows()?
            .into_iter()
            .filter(AttendanceRecord::is_pending)
            .collect())
    }

    /// Every record, in append order.
    pub fn list_all(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let _guard = self.lock.lock();
        self.read_rows()
    }

    /// Move every pending row keyed by `(identity, timestamp)` to confirmed.
    ///
    /// Returns `false` when nothing pending matched; the file is then left
    /// untouched.
    pub fn confirm(&self, identity: &str, timestamp: &str) -> Result<bool, LogError> {
        let _guard = self.lock.lock();
        let mut rows = self.read_rows()?;

        let mut confirmed = 0usize;
        for row in rows.iter_mut() {
            if row.is_pending() && row.matches(identity, timestamp) {
                row.status = AttendanceStatus::Confirmed;
                confirmed += 1;
            }
        }

        if confirmed == 0 {
            tracing::debug!(identity, timestamp, "confirm: no pending match");
            return Ok(false);
        }
        if confirmed > 1 {
            tracing::warn!(identity, timestamp, count = confirmed, "confirm: duplicate key");
        }

        self.replace_rows(&rows)?;
        tracing::info!(identity, timestamp, count = confirmed, "attendance confirmed");
        Ok(true)
    }

    /// Write the header if the file is missing or empty. Returns whether it wrote.
    fn ensure_header(&self) -> Result<bool, LogError> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > 0 => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(LOG_HEADER)?;
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;
        Ok(true)
    }

    fn read_rows(&self) -> Result<Vec<AttendanceRecord>, LogError> {
        let mut rdr = csv::Reader::from_path(&self.path)?;

        let headers = rdr.headers()?;
        if !headers.iter().eq(LOG_HEADER) {
            return Err(LogError::Corrupt {
                path: self.path.clone(),
                reason: format!(
                    "unexpected header {:?}, expected {:?}",
                    headers.iter().collect::<Vec<_>>(),
                    LOG_HEADER
                ),
            });
        }

        rdr.deserialize::<AttendanceRecord>()
            .enumerate()
            .map(|(i, row)| {
                row.map_err(|e| LogError::Corrupt {
                    path: self.path.clone(),
                    // +2: one for the header, one for 1-based numbering.
                    reason: format!("row {}: {e}", i + 2),
                })
            })
            .collect()
    }

    fn replace_rows(&self, rows: &[AttendanceRecord]) -> Result<(), LogError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            wtr.write_record(LOG_HEADER)?;
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        // Keep the log's mode; temp files are created 0600.
        tmp.as_file()
            .set_permissions(fs::metadata(&self.path)?.permissions())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
