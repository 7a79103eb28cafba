use std::time::SystemTime;

use log::{debug, info};

use crate::correction::CorrectionResult;
use crate::landmarks::LandmarkSet;
use crate::pose::PoseAngles;

/// Everything captured for the "before" photo, read back at "after" time.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub pose: PoseAngles,
    /// Encoded image bytes as captured.
    pub image: Vec<u8>,
    pub landmarks: Option<LandmarkSet>,
    pub timestamp: SystemTime,
    pub correction_result: Option<CorrectionResult>,
}

/// Single-slot in-memory holder for the before capture.
///
/// Setting always replaces the whole slot; there is no partial update.
#[derive(Debug, Default)]
pub struct PoseReferenceStore {
    reference: Option<ReferenceData>,
}

impl PoseReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new reference, overwriting any prior one. Any previously
    /// attached correction result is dropped with the old slot.
    pub fn set_reference(
        &mut self,
        pose: PoseAngles,
        image: Vec<u8>,
        landmarks: Option<LandmarkSet>,
    ) -> bool {
        info!(
            "before reference set: roll={:.1} pitch={:.1} yaw={:.1}",
            pose.roll, pose.pitch, pose.yaw
        );
        self.reference = Some(ReferenceData {
            pose,
            image,
            landmarks,
            timestamp: SystemTime::now(),
            correction_result: None,
        });
        true
    }

    /// Copy of the stored reference, or `None` if the slot is unset.
    pub fn get_reference(&self) -> Option<ReferenceData> {
        self.reference.clone()
    }

    /// Attach a correction result to the current reference. Silently does
    /// nothing when no reference is held.
    pub fn set_correction_result(&mut self, result: CorrectionResult) {
        if let Some(reference) = self.reference.as_mut() {
            debug!(
                "before correction attached: estimated roll={:.1} pitch={:.1} yaw={:.1}",
                result.estimated_corrected_pose.roll,
                result.estimated_corrected_pose.pitch,
                result.estimated_corrected_pose.yaw
            );
            reference.correction_result = Some(result);
        }
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Return to the fully-unset state.
    pub fn clear_reference(&mut self) {
        debug!("before reference cleared");
        self.reference = None;
    }

    /// Pose to display for the reference: the corrected estimate when a
    /// correction result is attached, the raw capture pose otherwise.
    pub fn display_pose(&self) -> Option<PoseAngles> {
        let reference = self.reference.as_ref()?;
        Some(
            reference
                .correction_result
                .as_ref()
                .map(|r| r.estimated_corrected_pose)
                .unwrap_or(reference.pose),
        )
    }
}
