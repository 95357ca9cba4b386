use attend_core::Thresholds;
use std::path::PathBuf;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// CSV attendance log path.
    pub log_path: PathBuf,
    /// Landmark sources: JSONL file paths, `-` for stdin.
    pub sources: Vec<String>,
    /// Minimum seconds between two accepted events for one identity.
    pub cooldown_secs: u64,
    /// Emotion classification thresholds.
    pub thresholds: Thresholds,
    /// Identity key assigned to every detected face.
    pub identity: String,
    pub bus: BusKind,
}

impl Config {
    /// Load configuration from `ATTEND_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Thresholds::default();

        let log_path = std::env::var("ATTEND_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| attend_core::default_log_path());

        Self {
            log_path,
            sources: parse_sources(&std::env::var("ATTEND_SOURCES").unwrap_or_default()),
            cooldown_secs: env_u64("ATTEND_COOLDOWN_SECS", 15),
            thresholds: Thresholds {
                mar_happy: env_f32("ATTEND_MAR_HAPPY", defaults.mar_happy),
                cheek_lift_max: env_f32("ATTEND_CHEEK_LIFT_MAX", defaults.cheek_lift_max),
                ear_tired: env_f32("ATTEND_EAR_TIRED", defaults.ear_tired),
            },
            identity: std::env::var("ATTEND_IDENTITY")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| attend_core::identity::DEFAULT_PLACEHOLDER_IDENTITY.to_string()),
            bus: match std::env::var("ATTEND_BUS").as_deref() {
                Ok("system") => BusKind::System,
                _ => BusKind::Session,
            },
        }
    }
}

/// Split a comma-separated source list; an empty list means stdin.
fn parse_sources(raw: &str) -> Vec<String> {
    let sources: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if sources.is_empty() {
        vec!["-".to_string()]
    } else {
        sources
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources_default_stdin() {
        assert_eq!(parse_sources(""), vec!["-"]);
        assert_eq!(parse_sources(" , "), vec!["-"]);
    }

    #[test]
    fn test_parse_sources_list() {
        assert_eq!(
            parse_sources("/run/cam0.jsonl, /run/cam1.jsonl"),
            vec!["/run/cam0.jsonl", "/run/cam1.jsonl"]
        );
    }

    #[test]
    fn test_env_fallback_when_unset() {
        assert_eq!(env_u64("ATTEND_TEST_UNSET_U64", 15), 15);
        assert_eq!(env_f32("ATTEND_TEST_UNSET_F32", 0.23), 0.23);
    }
}
