use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Second-resolution local timestamp format stored in the attendance log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A 2D landmark in frame pixel space.
///
/// Serialized as a two-element array `[x, y]`, the shape most landmark
/// detectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &LandmarkPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for LandmarkPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<LandmarkPoint> for (f32, f32) {
    fn from(p: LandmarkPoint) -> Self {
        (p.x, p.y)
    }
}

/// Emotional state estimated from facial geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Tired,
    Neutral,
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Tired => "tired",
            EmotionLabel::Neutral => "neutral",
        })
    }
}

/// Key identifying the subject of an attendance event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Pending,
    Confirmed,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttendanceStatus::Pending => "pending",
            AttendanceStatus::Confirmed => "confirmed",
        })
    }
}

/// One row of the attendance log.
///
/// `(identity, timestamp)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub identity: Identity,
    pub timestamp: String,
    pub status: AttendanceStatus,
    pub emotion: EmotionLabel,
}

impl AttendanceRecord {
    /// Build a new pending record stamped at `at`.
    pub fn pending(identity: Identity, at: NaiveDateTime, emotion: EmotionLabel) -> Self {
        Self {
            identity,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            status: AttendanceStatus::Pending,
            emotion,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == AttendanceStatus::Pending
    }

    /// Whether this record is addressed by the given natural key.
    pub fn matches(&self, identity: &str, timestamp: &str) -> bool {
        self.identity.as_str() == identity && self.timestamp == timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_landmark_distance() {
        let a = LandmarkPoint::new(0.0, 0.0);
        let b = LandmarkPoint::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_landmark_serializes_as_pair() {
        let p: LandmarkPoint = serde_json::from_str("[12.5, 40]").unwrap();
        assert_eq!(p, LandmarkPoint::new(12.5, 40.0));
        assert_eq!(serde_json::to_string(&p).unwrap(), "[12.5,40.0]");
    }

    #[test]
    fn test_pending_record_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(8, 5, 9)
            .unwrap();
        let r = AttendanceRecord::pending(Identity::new("person"), at, EmotionLabel::Tired);
        assert_eq!(r.timestamp, "2024-03-07 08:05:09");
        assert!(r.is_pending());
        assert!(r.matches("person", "2024-03-07 08:05:09"));
        assert!(!r.matches("person", "2024-03-07 08:05:10"));
    }

    #[test]
    fn test_record_json_shape() {
        let r = AttendanceRecord {
            identity: Identity::new("person"),
            timestamp: "2024-03-07 08:05:09".into(),
            status: AttendanceStatus::Confirmed,
            emotion: EmotionLabel::Happy,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["identity"], "person");
        assert_eq!(v["status"], "confirmed");
        assert_eq!(v["emotion"], "happy");
    }
}
