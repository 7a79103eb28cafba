use serde::{Deserialize, Serialize};

/// Head orientation in degrees: roll (in-plane tilt), pitch (nod), yaw (turn).
///
/// Values come straight from the external landmark detector; the type does
/// not enforce a range, but anything beyond roughly ±90° is outside what the
/// detector produces in practice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl PoseAngles {
    pub fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }
}
