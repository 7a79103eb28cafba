use serde::{Deserialize, Serialize};

/// Number of points in the face-mesh topology this crate consumes.
///
/// A frame with fewer points is unusable: every consumer falls back to a
/// safe default instead of erroring.
pub const LANDMARK_COUNT: usize = 468;

/// One face-mesh point, normalized to [0,1] relative to image width/height.
/// Depth is optional; most consumers only read x/y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }
}

/// A per-frame landmark snapshot: 468 slots, each possibly unresolved.
pub type LandmarkSet = Vec<Option<Landmark>>;

/// Named indices into the 468-point face-mesh topology.
///
/// Only the points this crate measures are named; the numbering follows the
/// detector's mesh layout and must not be reordered.
pub mod idx {
    // Anchor points
    pub const NOSE_TIP: usize = 1;
    pub const NOSE_BRIDGE: usize = 6;
    pub const FOREHEAD_CENTER: usize = 9;
    pub const CHIN_CENTER: usize = 175;

    // Mouth
    pub const LEFT_MOUTH_CORNER: usize = 61;
    pub const RIGHT_MOUTH_CORNER: usize = 291;
    pub const UPPER_LIP_TOP: usize = 13;
    pub const LOWER_LIP_BOTTOM: usize = 17;

    // Eyebrows, inner to outer
    pub const LEFT_EYEBROW: [usize; 4] = [70, 63, 105, 66];
    pub const RIGHT_EYEBROW: [usize; 4] = [300, 293, 334, 296];

    // Eyelids: (top, bottom) pairs at center/inner/outer per eye
    pub const LEFT_EYE_TOP: usize = 159;
    pub const LEFT_EYE_BOTTOM: usize = 145;
    pub const LEFT_EYE_TOP_INNER: usize = 158;
    pub const LEFT_EYE_BOTTOM_INNER: usize = 173;
    pub const LEFT_EYE_TOP_OUTER: usize = 157;
    pub const LEFT_EYE_BOTTOM_OUTER: usize = 144;

    pub const RIGHT_EYE_TOP: usize = 386;
    pub const RIGHT_EYE_BOTTOM: usize = 374;
    pub const RIGHT_EYE_TOP_INNER: usize = 385;
    pub const RIGHT_EYE_BOTTOM_INNER: usize = 398;
    pub const RIGHT_EYE_TOP_OUTER: usize = 384;
    pub const RIGHT_EYE_BOTTOM_OUTER: usize = 373;
}

/// Fetch a point by index, treating out-of-range and unresolved slots alike.
pub fn point(landmarks: &[Option<Landmark>], index: usize) -> Option<Landmark> {
    landmarks.get(index).copied().flatten()
}

/// True when the slice carries a full mesh and can be measured at all.
pub fn is_usable(landmarks: &[Option<Landmark>]) -> bool {
    landmarks.len() >= LANDMARK_COUNT
}
