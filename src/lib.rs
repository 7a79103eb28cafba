pub mod comparator;
pub mod config;
pub mod correction;
pub mod error;
pub mod expression;
pub mod landmarks;
pub mod pose;
pub mod reference;

// Re-export the per-frame surface for convenience
pub use comparator::{PoseComparator, PoseComparison, Tolerances};
pub use correction::{CorrectionParams, CorrectionResult};
pub use error::CorrectionError;
pub use expression::{ExpressionAnalyzer, ExpressionScore};
pub use landmarks::{Landmark, LandmarkSet, LANDMARK_COUNT};
pub use pose::PoseAngles;
pub use reference::PoseReferenceStore;
