use crate::engine::SourceHandle;
use attend_core::{AttendanceLog, LogError};
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "io.attend.Attend1";
pub const OBJECT_PATH: &str = "/io/attend/Attend1";

/// D-Bus query surface over the attendance log.
///
/// Bus name: io.attend.Attend1
/// Object path: /io/attend/Attend1
pub struct AttendService {
    log: Arc<AttendanceLog>,
    sources: Vec<SourceHandle>,
}

impl AttendService {
    pub fn new(log: Arc<AttendanceLog>, sources: Vec<SourceHandle>) -> Self {
        Self { log, sources }
    }
}

#[interface(name = "io.attend.Attend1")]
impl AttendService {
    /// Pending attendance records as a JSON array, in log order.
    async fn list_pending(&self) -> zbus::fdo::Result<String> {
        let records = with_log(&self.log, |log| log.list_pending()).await?;
        tracing::debug!(count = records.len(), "list_pending requested");
        to_json(&records)
    }

    /// Confirm the pending record(s) keyed by `(identity, timestamp)`.
    ///
    /// Returns false when no pending record matched.
    async fn confirm(&self, identity: &str, timestamp: &str) -> zbus::fdo::Result<bool> {
        let (identity, timestamp) = (identity.trim().to_string(), timestamp.trim().to_string());
        if identity.is_empty() || timestamp.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs(
                "identity and timestamp are required".into(),
            ));
        }

        tracing::info!(identity = %identity, timestamp = %timestamp, "confirm requested");
        with_log(&self.log, move |log| log.confirm(&identity, &timestamp)).await
    }

    /// Every attendance record as a JSON array, in log order.
    async fn history(&self) -> zbus::fdo::Result<String> {
        let records = with_log(&self.log, |log| log.list_all()).await?;
        to_json(&records)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let sources: Vec<_> = self.sources.iter().map(SourceHandle::status).collect();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "log_path": self.log.path().display().to_string(),
            "sources": sources,
        })
        .to_string())
    }
}

/// Run a blocking log operation off the async executor.
async fn with_log<T, F>(log: &Arc<AttendanceLog>, op: F) -> zbus::fdo::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AttendanceLog) -> Result<T, LogError> + Send + 'static,
{
    let log = Arc::clone(log);
    tokio::task::spawn_blocking(move || op(&log))
        .await
        .map_err(|e| zbus::fdo::Error::Failed(format!("log task failed: {e}")))?
        .map_err(|e| {
            tracing::error!(error = %e, "attendance log operation failed");
            zbus::fdo::Error::IOError(e.to_string())
        })
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}
