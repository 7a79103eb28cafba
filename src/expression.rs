use log::debug;
use serde::{Deserialize, Serialize};

use crate::landmarks::{self, idx, Landmark};

/// Frames accumulated before a baseline is computed.
pub const CALIBRATION_FRAMES: usize = 60;

// Detection sensitivities applied to face-scale-normalized deviations.
const SMILE_SENSITIVITY: f32 = 50.0;
const EYEBROW_SENSITIVITY: f32 = 25.0;
const EYE_TENSION_SENSITIVITY: f32 = 100.0;

// Display-scale normalization of the public metric values, independent of
// the detection sensitivities above.
const SMILE_DISPLAY_DIVISOR: f32 = 10.0;
const EYEBROW_DISPLAY_DIVISOR: f32 = 10.0;
const EYE_TENSION_DISPLAY_FACTOR: f32 = 40.0;

// Raw measurement scale factors; the normalized landmark deltas are tiny.
const MOUTH_SCALE: f32 = 1000.0;
const EYEBROW_SCALE: f32 = 2000.0;

/// Acceptance thresholds on the display-scaled metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpressionThresholds {
    pub smile: f32,
    pub eyebrow: f32,
    pub eye_tension: f32,
}

impl Default for ExpressionThresholds {
    fn default() -> Self {
        Self {
            smile: 0.3,
            eyebrow: 0.25,
            eye_tension: 0.3,
        }
    }
}

/// Per-user neutral-face baseline, the per-metric median over the
/// calibration window. Written once per calibration session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineData {
    pub mouth_height: f32,
    pub eyebrow_height: f32,
    pub eye_openness: f32,
    pub face_height: f32,
}

/// The four neutral-face measurements taken from a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub mouth_height: f32,
    pub eyebrow_height: f32,
    pub eye_openness: f32,
    pub face_height: f32,
}

/// Result of analyzing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionScore {
    pub mouth_smile: f32,
    pub eyebrow_raise: f32,
    pub eye_tension: f32,
    /// 100 minus expression penalties, clamped to [0, 100].
    pub overall_score: f32,
    pub is_calibrated: bool,
    /// Percentage of the calibration window filled; only set mid-calibration.
    pub calibration_progress: Option<f32>,
}

impl ExpressionScore {
    /// Neutral placeholder for unusable frames and uncalibrated state.
    fn default_uncalibrated() -> Self {
        Self {
            mouth_smile: 0.0,
            eyebrow_raise: 0.0,
            eye_tension: 0.0,
            overall_score: 100.0,
            is_calibrated: false,
            calibration_progress: None,
        }
    }
}

/// Learns a per-user neutral baseline from an initial run of frames, then
/// scores each subsequent frame for deviation from it.
///
/// State machine: uncalibrated → calibrating (buffer below the window
/// size) → calibrated, terminal until [`ExpressionAnalyzer::reset_calibration`].
pub struct ExpressionAnalyzer {
    baseline: Option<BaselineData>,
    calibration: Vec<Measurements>,
    thresholds: ExpressionThresholds,
}

impl Default for ExpressionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionAnalyzer {
    pub fn new() -> Self {
        Self::with_thresholds(ExpressionThresholds::default())
    }

    pub fn with_thresholds(thresholds: ExpressionThresholds) -> Self {
        Self {
            baseline: None,
            calibration: Vec::with_capacity(CALIBRATION_FRAMES),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> ExpressionThresholds {
        self.thresholds
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Analyze one frame. Unusable frames (short landmark slice) return the
    /// neutral placeholder and do not advance calibration.
    pub fn analyze(&mut self, frame: &[Option<Landmark>]) -> ExpressionScore {
        if !landmarks::is_usable(frame) {
            return ExpressionScore::default_uncalibrated();
        }

        let Some(baseline) = self.baseline else {
            return self.calibrate(frame);
        };

        let current = measure(frame);

        // Normalize for camera distance before comparing to the baseline
        let face_scale = if baseline.face_height.abs() > f32::EPSILON {
            current.face_height / baseline.face_height
        } else {
            1.0
        };
        let face_scale = if face_scale.abs() > f32::EPSILON {
            face_scale
        } else {
            1.0
        };

        let smile = deviation(current.mouth_height, baseline.mouth_height, face_scale)
            * SMILE_SENSITIVITY;
        let smile = smile.max(0.0);

        let eyebrow = deviation(current.eyebrow_height, baseline.eyebrow_height, face_scale)
            * EYEBROW_SENSITIVITY;
        let eyebrow = eyebrow.max(0.0);

        // Inverted: less openness than baseline signals tension
        let tension = deviation(baseline.eye_openness, current.eye_openness, face_scale)
            * EYE_TENSION_SENSITIVITY;
        let tension = tension.max(0.0);

        let overall = overall_score(smile, eyebrow, tension);

        ExpressionScore {
            mouth_smile: (smile / SMILE_DISPLAY_DIVISOR).max(0.0),
            eyebrow_raise: (eyebrow / EYEBROW_DISPLAY_DIVISOR).max(0.0),
            eye_tension: (tension * EYE_TENSION_DISPLAY_FACTOR).max(0.0),
            overall_score: overall.round(),
            is_calibrated: true,
            calibration_progress: None,
        }
    }

    /// True when the frame is neutral enough to capture. Permissive while
    /// uncalibrated so the gate never blocks before a baseline exists.
    pub fn is_expression_acceptable(&self, score: &ExpressionScore) -> bool {
        if !score.is_calibrated {
            return true;
        }
        score.mouth_smile < self.thresholds.smile
            && score.eyebrow_raise < self.thresholds.eyebrow
            && score.eye_tension < self.thresholds.eye_tension
    }

    /// Drop the baseline and calibration buffer; the next frames calibrate anew.
    pub fn reset_calibration(&mut self) {
        self.baseline = None;
        self.calibration.clear();
    }

    fn calibrate(&mut self, frame: &[Option<Landmark>]) -> ExpressionScore {
        self.calibration.push(measure(frame));

        if self.calibration.len() >= CALIBRATION_FRAMES {
            self.baseline = Some(self.compute_baseline());
            debug!(
                "expression baseline calibrated over {} frames: {:?}",
                self.calibration.len(),
                self.baseline
            );
            // Score the triggering frame under the fresh baseline
            return self.analyze(frame);
        }

        ExpressionScore {
            mouth_smile: 0.0,
            eyebrow_raise: 0.0,
            eye_tension: 0.0,
            overall_score: 100.0,
            is_calibrated: false,
            calibration_progress: Some(
                self.calibration.len() as f32 / CALIBRATION_FRAMES as f32 * 100.0,
            ),
        }
    }

    /// Median per metric across the window; resists blink and transient
    /// expression outliers better than a mean would.
    fn compute_baseline(&self) -> BaselineData {
        BaselineData {
            mouth_height: median(self.calibration.iter().map(|m| m.mouth_height)),
            eyebrow_height: median(self.calibration.iter().map(|m| m.eyebrow_height)),
            eye_openness: median(self.calibration.iter().map(|m| m.eye_openness)),
            face_height: median(self.calibration.iter().map(|m| m.face_height)),
        }
    }
}

fn deviation(current: f32, baseline: f32, face_scale: f32) -> f32 {
    current / face_scale - baseline / face_scale
}

fn overall_score(smile: f32, eyebrow: f32, tension: f32) -> f32 {
    // Deduction weights on the raw sensitivity-scaled metrics, each capped
    let smile_penalty = (smile * 20.0).min(30.0);
    let eyebrow_penalty = (eyebrow * 25.0).min(35.0);
    let tension_penalty = (tension * 15.0).min(25.0);
    (100.0 - smile_penalty - eyebrow_penalty - tension_penalty).clamp(0.0, 100.0)
}

fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut sorted: Vec<f32> = values.collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let len = sorted.len();
    if len == 0 {
        0.0
    } else if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// Extract the four measurements from a full-mesh frame. Each measurement
/// degrades to its safe default when its required points are unresolved.
pub fn measure(frame: &[Option<Landmark>]) -> Measurements {
    Measurements {
        mouth_height: mouth_height(frame),
        eyebrow_height: eyebrow_height(frame),
        eye_openness: eye_openness(frame),
        face_height: face_height(frame),
    }
}

/// Mouth-corner lift relative to the lip center, anchored at the nose tip.
/// Corners above the lip midpoint read as a smile.
fn mouth_height(frame: &[Option<Landmark>]) -> f32 {
    let (Some(left), Some(right), Some(upper), Some(lower), Some(nose)) = (
        landmarks::point(frame, idx::LEFT_MOUTH_CORNER),
        landmarks::point(frame, idx::RIGHT_MOUTH_CORNER),
        landmarks::point(frame, idx::UPPER_LIP_TOP),
        landmarks::point(frame, idx::LOWER_LIP_BOTTOM),
        landmarks::point(frame, idx::NOSE_TIP),
    ) else {
        return 0.0;
    };

    let corner_avg_y = (left.y + right.y) / 2.0;
    let lip_center_y = (upper.y + lower.y) / 2.0;

    // Nose-relative so head position in frame does not shift the value
    let corners_rel = corner_avg_y - nose.y;
    let lip_center_rel = lip_center_y - nose.y;

    ((lip_center_rel - corners_rel) * MOUTH_SCALE).max(0.0)
}

/// Eyebrow lift above the eye tops, anchored at the nose bridge. Tolerates
/// partially unresolved brows; needs at least one point per brow.
fn eyebrow_height(frame: &[Option<Landmark>]) -> f32 {
    let left_brow: Vec<Landmark> = idx::LEFT_EYEBROW
        .iter()
        .filter_map(|&i| landmarks::point(frame, i))
        .collect();
    let right_brow: Vec<Landmark> = idx::RIGHT_EYEBROW
        .iter()
        .filter_map(|&i| landmarks::point(frame, i))
        .collect();

    let (Some(left_eye_top), Some(right_eye_top), Some(bridge)) = (
        landmarks::point(frame, idx::LEFT_EYE_TOP),
        landmarks::point(frame, idx::RIGHT_EYE_TOP),
        landmarks::point(frame, idx::NOSE_BRIDGE),
    ) else {
        return 0.0;
    };

    if left_brow.is_empty() || right_brow.is_empty() {
        return 0.0;
    }

    let left_avg_y = left_brow.iter().map(|p| p.y).sum::<f32>() / left_brow.len() as f32;
    let right_avg_y = right_brow.iter().map(|p| p.y).sum::<f32>() / right_brow.len() as f32;
    let brow_avg_y = (left_avg_y + right_avg_y) / 2.0;

    let eye_top_avg_y = (left_eye_top.y + right_eye_top.y) / 2.0;

    let brow_rel = brow_avg_y - bridge.y;
    let eye_rel = eye_top_avg_y - bridge.y;

    ((eye_rel - brow_rel) * EYEBROW_SCALE).max(0.0)
}

/// Average eyelid gap across three vertical measurements per eye. All
/// twelve eyelid points must resolve; a partial eye reads as 0.
fn eye_openness(frame: &[Option<Landmark>]) -> f32 {
    const LEFT: [(usize, usize); 3] = [
        (idx::LEFT_EYE_TOP, idx::LEFT_EYE_BOTTOM),
        (idx::LEFT_EYE_TOP_INNER, idx::LEFT_EYE_BOTTOM_INNER),
        (idx::LEFT_EYE_TOP_OUTER, idx::LEFT_EYE_BOTTOM_OUTER),
    ];
    const RIGHT: [(usize, usize); 3] = [
        (idx::RIGHT_EYE_TOP, idx::RIGHT_EYE_BOTTOM),
        (idx::RIGHT_EYE_TOP_INNER, idx::RIGHT_EYE_BOTTOM_INNER),
        (idx::RIGHT_EYE_TOP_OUTER, idx::RIGHT_EYE_BOTTOM_OUTER),
    ];

    let eye_gap = |pairs: &[(usize, usize); 3]| -> Option<f32> {
        let mut total = 0.0;
        for &(top, bottom) in pairs {
            let t = landmarks::point(frame, top)?;
            let b = landmarks::point(frame, bottom)?;
            total += (t.y - b.y).abs();
        }
        Some(total / 3.0)
    };

    match (eye_gap(&LEFT), eye_gap(&RIGHT)) {
        (Some(left), Some(right)) => (left + right) / 2.0,
        _ => 0.0,
    }
}

/// Forehead-to-chin distance, used only as a scale normalizer. Falls back
/// to 1.0 so downstream division stays defined.
fn face_height(frame: &[Option<Landmark>]) -> f32 {
    let (Some(forehead), Some(chin)) = (
        landmarks::point(frame, idx::FOREHEAD_CENTER),
        landmarks::point(frame, idx::CHIN_CENTER),
    ) else {
        return 1.0;
    };
    (forehead.y - chin.y).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LandmarkSet, LANDMARK_COUNT};

    /// A plausible neutral face with every mesh point resolved.
    fn neutral_frame() -> LandmarkSet {
        let mut frame: LandmarkSet = (0..LANDMARK_COUNT)
            .map(|i| {
                let t = i as f32 / LANDMARK_COUNT as f32;
                Some(Landmark::new(0.3 + 0.4 * t, 0.3 + 0.4 * (1.0 - t)))
            })
            .collect();

        frame[idx::NOSE_TIP] = Some(Landmark::new(0.50, 0.50));
        frame[idx::NOSE_BRIDGE] = Some(Landmark::new(0.50, 0.42));
        frame[idx::FOREHEAD_CENTER] = Some(Landmark::new(0.50, 0.25));
        frame[idx::CHIN_CENTER] = Some(Landmark::new(0.50, 0.80));

        frame[idx::LEFT_MOUTH_CORNER] = Some(Landmark::new(0.42, 0.66));
        frame[idx::RIGHT_MOUTH_CORNER] = Some(Landmark::new(0.58, 0.66));
        frame[idx::UPPER_LIP_TOP] = Some(Landmark::new(0.50, 0.63));
        frame[idx::LOWER_LIP_BOTTOM] = Some(Landmark::new(0.50, 0.69));

        for (k, &i) in idx::LEFT_EYEBROW.iter().enumerate() {
            frame[i] = Some(Landmark::new(0.38 + 0.02 * k as f32, 0.36));
        }
        for (k, &i) in idx::RIGHT_EYEBROW.iter().enumerate() {
            frame[i] = Some(Landmark::new(0.56 + 0.02 * k as f32, 0.36));
        }

        frame[idx::LEFT_EYE_TOP] = Some(Landmark::new(0.42, 0.44));
        frame[idx::LEFT_EYE_BOTTOM] = Some(Landmark::new(0.42, 0.47));
        frame[idx::LEFT_EYE_TOP_INNER] = Some(Landmark::new(0.44, 0.445));
        frame[idx::LEFT_EYE_BOTTOM_INNER] = Some(Landmark::new(0.44, 0.465));
        frame[idx::LEFT_EYE_TOP_OUTER] = Some(Landmark::new(0.40, 0.445));
        frame[idx::LEFT_EYE_BOTTOM_OUTER] = Some(Landmark::new(0.40, 0.465));

        frame[idx::RIGHT_EYE_TOP] = Some(Landmark::new(0.58, 0.44));
        frame[idx::RIGHT_EYE_BOTTOM] = Some(Landmark::new(0.58, 0.47));
        frame[idx::RIGHT_EYE_TOP_INNER] = Some(Landmark::new(0.56, 0.445));
        frame[idx::RIGHT_EYE_BOTTOM_INNER] = Some(Landmark::new(0.56, 0.465));
        frame[idx::RIGHT_EYE_TOP_OUTER] = Some(Landmark::new(0.60, 0.445));
        frame[idx::RIGHT_EYE_BOTTOM_OUTER] = Some(Landmark::new(0.60, 0.465));

        frame
    }

    /// Same face with the mouth corners lifted toward a smile.
    fn smiling_frame() -> LandmarkSet {
        let mut frame = neutral_frame();
        frame[idx::LEFT_MOUTH_CORNER] = Some(Landmark::new(0.41, 0.63));
        frame[idx::RIGHT_MOUTH_CORNER] = Some(Landmark::new(0.59, 0.63));
        frame
    }

    fn calibrate(analyzer: &mut ExpressionAnalyzer) {
        let frame = neutral_frame();
        for _ in 0..CALIBRATION_FRAMES {
            analyzer.analyze(&frame);
        }
        assert!(analyzer.is_calibrated());
    }

    #[test]
    fn test_short_landmark_set_is_safe() {
        let mut analyzer = ExpressionAnalyzer::new();
        let short: LandmarkSet = vec![Some(Landmark::new(0.5, 0.5)); 100];

        let score = analyzer.analyze(&short);
        assert!(!score.is_calibrated);
        assert_eq!(score.overall_score, 100.0);
        assert!(score.calibration_progress.is_none());

        // Unusable frames do not advance calibration either
        assert!(analyzer.calibration.is_empty());
    }

    #[test]
    fn test_calibration_progress() {
        let mut analyzer = ExpressionAnalyzer::new();
        let frame = neutral_frame();

        let score = analyzer.analyze(&frame);
        assert!(!score.is_calibrated);
        let progress = score.calibration_progress.unwrap();
        assert!((progress - 100.0 / CALIBRATION_FRAMES as f32).abs() < 1e-4);

        for _ in 0..CALIBRATION_FRAMES - 2 {
            let score = analyzer.analyze(&frame);
            assert!(!score.is_calibrated);
        }
        assert!(!analyzer.is_calibrated());

        // The 60th frame completes calibration and is scored in the same call
        let score = analyzer.analyze(&frame);
        assert!(score.is_calibrated);
        assert!(score.calibration_progress.is_none());
    }

    #[test]
    fn test_identical_frames_score_neutral() {
        let mut analyzer = ExpressionAnalyzer::new();
        calibrate(&mut analyzer);

        let score = analyzer.analyze(&neutral_frame());
        assert!(score.is_calibrated);
        assert!(score.mouth_smile.abs() < 1e-3);
        assert!(score.eyebrow_raise.abs() < 1e-3);
        assert!(score.eye_tension.abs() < 1e-3);
        assert!((score.overall_score - 100.0).abs() < 1e-3);
        assert!(analyzer.is_expression_acceptable(&score));
    }

    #[test]
    fn test_smile_detected_and_rejected() {
        let mut analyzer = ExpressionAnalyzer::new();
        calibrate(&mut analyzer);

        let score = analyzer.analyze(&smiling_frame());
        assert!(score.mouth_smile > 0.3);
        assert!(score.overall_score < 100.0);
        assert!(!analyzer.is_expression_acceptable(&score));
    }

    #[test]
    fn test_eye_tension_detected() {
        let mut analyzer = ExpressionAnalyzer::new();
        calibrate(&mut analyzer);

        // Narrow both eyes well below the calibrated openness
        let mut frame = neutral_frame();
        for (top, bottom) in [
            (idx::LEFT_EYE_TOP, idx::LEFT_EYE_BOTTOM),
            (idx::LEFT_EYE_TOP_INNER, idx::LEFT_EYE_BOTTOM_INNER),
            (idx::LEFT_EYE_TOP_OUTER, idx::LEFT_EYE_BOTTOM_OUTER),
            (idx::RIGHT_EYE_TOP, idx::RIGHT_EYE_BOTTOM),
            (idx::RIGHT_EYE_TOP_INNER, idx::RIGHT_EYE_BOTTOM_INNER),
            (idx::RIGHT_EYE_TOP_OUTER, idx::RIGHT_EYE_BOTTOM_OUTER),
        ] {
            let t = frame[top].unwrap();
            let b = frame[bottom].unwrap();
            let mid = (t.y + b.y) / 2.0;
            frame[top] = Some(Landmark::new(t.x, mid - 0.002));
            frame[bottom] = Some(Landmark::new(b.x, mid + 0.002));
        }

        let score = analyzer.analyze(&frame);
        assert!(score.eye_tension > 0.0);
        assert!(score.overall_score < 100.0);
    }

    #[test]
    fn test_overall_score_bounded_under_extremes() {
        let mut analyzer = ExpressionAnalyzer::new();
        calibrate(&mut analyzer);

        // Grossly exaggerated expression on every metric
        let mut frame = neutral_frame();
        frame[idx::LEFT_MOUTH_CORNER] = Some(Landmark::new(0.35, 0.40));
        frame[idx::RIGHT_MOUTH_CORNER] = Some(Landmark::new(0.65, 0.40));
        for &i in idx::LEFT_EYEBROW.iter().chain(idx::RIGHT_EYEBROW.iter()) {
            let p = frame[i].unwrap();
            frame[i] = Some(Landmark::new(p.x, p.y - 0.2));
        }

        let score = analyzer.analyze(&frame);
        assert!(score.overall_score >= 0.0);
        assert!(score.overall_score <= 100.0);
    }

    #[test]
    fn test_median_baseline_resists_outliers() {
        let mut analyzer = ExpressionAnalyzer::new();
        let neutral = neutral_frame();
        let smiling = smiling_frame();

        // A handful of smile frames scattered into the window
        for i in 0..CALIBRATION_FRAMES {
            if i % 15 == 7 {
                analyzer.analyze(&smiling);
            } else {
                analyzer.analyze(&neutral);
            }
        }
        assert!(analyzer.is_calibrated());

        // Baseline should still read the neutral mouth height
        let neutral_mouth = measure(&neutral).mouth_height;
        let baseline = analyzer.baseline.unwrap();
        assert!((baseline.mouth_height - neutral_mouth).abs() < 1e-3);
    }

    #[test]
    fn test_reset_calibration() {
        let mut analyzer = ExpressionAnalyzer::new();
        calibrate(&mut analyzer);

        analyzer.reset_calibration();
        assert!(!analyzer.is_calibrated());

        let score = analyzer.analyze(&neutral_frame());
        assert!(!score.is_calibrated);
        assert!(score.calibration_progress.is_some());
    }

    #[test]
    fn test_uncalibrated_gate_is_permissive() {
        let analyzer = ExpressionAnalyzer::new();
        let score = ExpressionScore::default_uncalibrated();
        assert!(analyzer.is_expression_acceptable(&score));
    }

    #[test]
    fn test_missing_points_measure_zero() {
        let mut frame = neutral_frame();
        frame[idx::LEFT_MOUTH_CORNER] = None;
        assert_eq!(mouth_height(&frame), 0.0);

        let mut frame = neutral_frame();
        frame[idx::LEFT_EYE_TOP_INNER] = None;
        assert_eq!(eye_openness(&frame), 0.0);

        // Eyebrow tolerates a partially resolved brow
        let mut frame = neutral_frame();
        frame[idx::LEFT_EYEBROW[0]] = None;
        frame[idx::LEFT_EYEBROW[1]] = None;
        assert!(eyebrow_height(&frame) >= 0.0);

        // Face height stays a usable normalizer
        let mut frame = neutral_frame();
        frame[idx::FOREHEAD_CENTER] = None;
        assert_eq!(face_height(&frame), 1.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median([3.0, 1.0, 2.0].into_iter()), 2.0);
        assert_eq!(median([4.0, 1.0, 3.0, 2.0].into_iter()), 2.5);
        assert_eq!(median(std::iter::empty()), 0.0);
    }
}
