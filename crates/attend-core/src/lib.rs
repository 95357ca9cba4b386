//! attend-core — Attendance event pipeline.
//!
//! Classifies facial landmark geometry into an emotion label, rate-limits
//! events per identity, and records them in a CSV attendance log with a
//! pending → confirmed lifecycle.

pub mod classifier;
pub mod cooldown;
pub mod identity;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;

pub use classifier::{ClassifierError, FaceMetrics, GeometryClassifier, LandmarkScheme, Thresholds};
pub use cooldown::CooldownGate;
pub use identity::{IdentityResolver, PlaceholderResolver};
pub use pipeline::{EventPipeline, LocalClock, PipelineError, WallClock};
pub use source::{JsonLinesSource, LandmarkFrame, LandmarkSource, SourceError};
pub use store::{AttendanceLog, LogError};
pub use types::{AttendanceRecord, AttendanceStatus, EmotionLabel, Identity, LandmarkPoint};

/// Default attendance log location: `$XDG_DATA_HOME/attend/attendance.csv`.
pub fn default_log_path() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
        .join("attend")
        .join("attendance.csv")
}
