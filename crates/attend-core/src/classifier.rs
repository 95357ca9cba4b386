//! Geometric emotion classifier.
//!
//! Derives eye-aspect-ratio (EAR), mouth-aspect-ratio (MAR) and cheek-lift
//! from one face's landmark sequence and maps them to an [`EmotionLabel`]
//! with fixed-priority threshold rules.

use crate::types::{EmotionLabel, LandmarkPoint};
use serde::Serialize;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const DEFAULT_MAR_HAPPY: f32 = 0.30;
const DEFAULT_CHEEK_LIFT_MAX: f32 = 45.0;
const DEFAULT_EAR_TIRED: f32 = 0.23;
const MIN_HORIZONTAL_DISTANCE: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("landmark sequence too short: scheme needs {required} points, got {actual}")]
    InsufficientLandmarks { required: usize, actual: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("degenerate {feature} geometry: corners {a} and {b} coincide")]
    Degenerate {
        feature: &'static str,
        a: usize,
        b: usize,
    },
}

/// Landmark indices consumed by the classifier.
///
/// Each six-point group is ordered p1..p6: p1/p4 are the horizontal corners,
/// p2/p3 the upper points and p5/p6 the lower points, so that p2 sits above
/// p6 and p3 above p5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkScheme {
    pub right_eye: [usize; 6],
    pub left_eye: [usize; 6],
    pub mouth: [usize; 6],
    pub mouth_corner: usize,
    pub cheek: usize,
}

impl LandmarkScheme {
    /// iBUG 300-W 68-point layout, as emitted by dlib-style shape predictors.
    pub const IBUG_68: LandmarkScheme = LandmarkScheme {
        right_eye: [36, 37, 38, 39, 40, 41],
        left_eye: [42, 43, 44, 45, 46, 47],
        mouth: [48, 50, 52, 54, 56, 58],
        mouth_corner: 48,
        cheek: 2,
    };

    /// Minimum sequence length that resolves every index in the scheme.
    pub fn required_len(&self) -> usize {
        self.right_eye
            .iter()
            .chain(&self.left_eye)
            .chain(&self.mouth)
            .chain([&self.mouth_corner, &self.cheek])
            .max()
            .map_or(0, |&i| i + 1)
    }
}

impl Default for LandmarkScheme {
    fn default() -> Self {
        Self::IBUG_68
    }
}

/// Decision thresholds, evaluated in priority order by [`Thresholds::label`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// MAR at or above which an open mouth counts towards Happy.
    pub mar_happy: f32,
    /// Cheek-lift (pixels) strictly below which the mouth corner counts as raised.
    pub cheek_lift_max: f32,
    /// EAR strictly below which the eyes count as closing.
    pub ear_tired: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mar_happy: DEFAULT_MAR_HAPPY,
            cheek_lift_max: DEFAULT_CHEEK_LIFT_MAX,
            ear_tired: DEFAULT_EAR_TIRED,
        }
    }
}

impl Thresholds {
    /// Map measured geometry to a label. First match wins.
    pub fn label(&self, m: &FaceMetrics) -> EmotionLabel {
        if m.mar >= self.mar_happy && m.cheek_lift < self.cheek_lift_max {
            EmotionLabel::Happy
        } else if m.ear < self.ear_tired {
            EmotionLabel::Tired
        } else {
            EmotionLabel::Neutral
        }
    }
}

/// Geometry measured from one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceMetrics {
    /// Mean EAR of both eyes.
    pub ear: f32,
    pub mar: f32,
    /// `mouth_corner.y - cheek.y`; lower means the corner sits higher.
    pub cheek_lift: f32,
}

/// Stateless landmark → emotion classifier.
#[derive(Debug, Clone, Default)]
pub struct GeometryClassifier {
    scheme: LandmarkScheme,
    thresholds: Thresholds,
}

impl GeometryClassifier {
    pub fn new(scheme: LandmarkScheme, thresholds: Thresholds) -> Self {
        Self { scheme, thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classify one face.
    pub fn classify(&self, landmarks: &[LandmarkPoint]) -> Result<EmotionLabel, ClassifierError> {
        Ok(self.thresholds.label(&self.measure(landmarks)?))
    }

    /// Compute EAR, MAR and cheek-lift without classifying.
    pub fn measure(&self, landmarks: &[LandmarkPoint]) -> Result<FaceMetrics, ClassifierError> {
        let required = self.scheme.required_len();
        if landmarks.len() < required {
            return Err(ClassifierError::InsufficientLandmarks {
                required,
                actual: landmarks.len(),
            });
        }

        let right = aspect_ratio(landmarks, &self.scheme.right_eye, "eye")?;
        let left = aspect_ratio(landmarks, &self.scheme.left_eye, "eye")?;
        let mar = aspect_ratio(landmarks, &self.scheme.mouth, "mouth")?;

        let corner = point(landmarks, self.scheme.mouth_corner)?;
        let cheek = point(landmarks, self.scheme.cheek)?;

        Ok(FaceMetrics {
            ear: (right + left) / 2.0,
            mar,
            cheek_lift: corner.y - cheek.y,
        })
    }
}

fn point(landmarks: &[LandmarkPoint], index: usize) -> Result<LandmarkPoint, ClassifierError> {
    let p = landmarks[index];
    if !p.is_finite() {
        return Err(ClassifierError::NonFinite { index });
    }
    Ok(p)
}

/// `(d(p2,p6) + d(p3,p5)) / (2 * d(p1,p4))`
fn aspect_ratio(
    landmarks: &[LandmarkPoint],
    idx: &[usize; 6],
    feature: &'static str,
) -> Result<f32, ClassifierError> {
    let [p1, p2, p3, p4, p5, p6] = [
        point(landmarks, idx[0])?,
        point(landmarks, idx[1])?,
        point(landmarks, idx[2])?,
        point(landmarks, idx[3])?,
        point(landmarks, idx[4])?,
        point(landmarks, idx[5])?,
    ];

    let horizontal = p1.distance(&p4);
    if horizontal < MIN_HORIZONTAL_DISTANCE {
        return Err(ClassifierError::Degenerate {
            feature,
            a: idx[0],
            b: idx[3],
        });
    }

    Ok((p2.distance(&p6) + p3.distance(&p5)) / (2.0 * horizontal))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(ear: f32, mar: f32, cheek_lift: f32) -> FaceMetrics {
        FaceMetrics { ear, mar, cheek_lift }
    }

    #[test]
    fn test_measure_synthetic_face() {
        let c = GeometryClassifier::default();
        let m = c.measure(&synthetic::face(0.25, 0.35, 20.0)).unwrap();
        assert!((m.ear - 0.25).abs() < 1e-4, "ear = {}", m.ear);
        assert!((m.mar - 0.35).abs() < 1e-4, "mar = {}", m.mar);
        assert!((m.cheek_lift - 20.0).abs() < 1e-4, "cheek_lift = {}", m.cheek_lift);
    }

    #[test]
    fn test_ear_averages_both_eyes() {
        let c = GeometryClassifier::default();
        let mut face = synthetic::face(0.30, 0.10, 60.0);
        // Flatten the left eye lids onto the corner line: EAR 0 for that eye.
        for i in [43, 44, 46, 47] {
            face[i].y = 100.0;
        }
        let m = c.measure(&face).unwrap();
        assert!((m.ear - 0.15).abs() < 1e-4, "ear = {}", m.ear);
    }

    #[test]
    fn test_classify_happy() {
        let c = GeometryClassifier::default();
        assert_eq!(c.classify(&synthetic::face(0.25, 0.35, 20.0)), Ok(EmotionLabel::Happy));
    }

    #[test]
    fn test_classify_tired() {
        let c = GeometryClassifier::default();
        assert_eq!(c.classify(&synthetic::face(0.15, 0.10, 60.0)), Ok(EmotionLabel::Tired));
    }

    #[test]
    fn test_classify_neutral() {
        let c = GeometryClassifier::default();
        assert_eq!(c.classify(&synthetic::face(0.30, 0.10, 60.0)), Ok(EmotionLabel::Neutral));
    }

    #[test]
    fn test_happy_takes_priority_over_tired() {
        let t = Thresholds::default();
        assert_eq!(t.label(&metrics(0.10, 0.40, 10.0)), EmotionLabel::Happy);
    }

    #[test]
    fn test_mar_boundary_is_inclusive() {
        let t = Thresholds::default();
        assert_eq!(t.label(&metrics(0.25, 0.30, 44.0)), EmotionLabel::Happy);
    }

    #[test]
    fn test_cheek_lift_boundary_is_exclusive() {
        let t = Thresholds::default();
        // Falls through to the EAR branch.
        assert_eq!(t.label(&metrics(0.25, 0.30, 45.0)), EmotionLabel::Neutral);
        assert_eq!(t.label(&metrics(0.20, 0.30, 45.0)), EmotionLabel::Tired);
    }

    #[test]
    fn test_ear_boundary_is_exclusive() {
        let t = Thresholds::default();
        assert_eq!(t.label(&metrics(0.23, 0.0, 0.0)), EmotionLabel::Neutral);
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds {
            mar_happy: 0.5,
            cheek_lift_max: 10.0,
            ear_tired: 0.3,
        };
        assert_eq!(t.label(&metrics(0.25, 0.35, 5.0)), EmotionLabel::Tired);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let c = GeometryClassifier::default();
        let face = synthetic::face(0.22, 0.31, 44.5);
        let first = c.classify(&face).unwrap();
        for _ in 0..10 {
            assert_eq!(c.classify(&face).unwrap(), first);
        }
    }

    #[test]
    fn test_too_few_landmarks() {
        let c = GeometryClassifier::default();
        let face = vec![LandmarkPoint::new(0.0, 0.0); 5];
        assert_eq!(
            c.classify(&face),
            Err(ClassifierError::InsufficientLandmarks { required: 59, actual: 5 })
        );
    }

    #[test]
    fn test_degenerate_mouth() {
        let c = GeometryClassifier::default();
        let mut face = synthetic::face(0.25, 0.35, 20.0);
        face[54] = face[48];
        assert!(matches!(
            c.classify(&face),
            Err(ClassifierError::Degenerate { feature: "mouth", a: 48, b: 54 })
        ));
    }

    #[test]
    fn test_non_finite_landmark() {
        let c = GeometryClassifier::default();
        let mut face = synthetic::face(0.25, 0.35, 20.0);
        face[37] = LandmarkPoint::new(f32::NAN, 90.0);
        assert_eq!(c.classify(&face), Err(ClassifierError::NonFinite { index: 37 }));
    }

    #[test]
    fn test_scheme_required_len() {
        assert_eq!(LandmarkScheme::IBUG_68.required_len(), 59);
    }
}
