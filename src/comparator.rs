use serde::{Deserialize, Serialize};

use crate::pose::PoseAngles;

/// Maximum acceptable per-axis deviation in degrees before guidance fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            roll: 2.0,
            pitch: 4.0,
            yaw: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// One directional correction for an axis outside tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub axis: Axis,
    pub direction: Direction,
    /// Absolute deviation in degrees.
    pub amount: f32,
}

/// Per-axis pass/fail against the tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceCheck {
    pub roll: bool,
    pub pitch: bool,
    pub yaw: bool,
}

/// Full comparison of a live pose against the stored reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseComparison {
    /// Signed current minus reference, per axis.
    pub differences: PoseAngles,
    /// Absolute differences.
    pub deviations: PoseAngles,
    pub within_tolerance: ToleranceCheck,
    pub overall_match: bool,
    /// One entry per failing axis, in roll, pitch, yaw order.
    pub adjustments: Vec<Adjustment>,
    /// 0-100, each axis scored against twice its tolerance.
    pub match_percentage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceKind {
    Success,
    Warning,
    Reference,
}

/// On-screen prompt derived from a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Guidance {
    pub message: String,
    pub kind: GuidanceKind,
}

/// Stateless reference-vs-live pose comparison with mutable tolerances.
#[derive(Debug, Clone, Default)]
pub struct PoseComparator {
    tolerances: Tolerances,
}

impl PoseComparator {
    pub fn new(tolerances: Tolerances) -> Self {
        Self { tolerances }
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn set_tolerances(&mut self, tolerances: Tolerances) {
        self.tolerances = tolerances;
    }

    pub fn compare(&self, reference: PoseAngles, current: PoseAngles) -> PoseComparison {
        let differences = PoseAngles {
            roll: current.roll - reference.roll,
            pitch: current.pitch - reference.pitch,
            yaw: current.yaw - reference.yaw,
        };
        let deviations = PoseAngles {
            roll: differences.roll.abs(),
            pitch: differences.pitch.abs(),
            yaw: differences.yaw.abs(),
        };
        let within_tolerance = ToleranceCheck {
            roll: deviations.roll <= self.tolerances.roll,
            pitch: deviations.pitch <= self.tolerances.pitch,
            yaw: deviations.yaw <= self.tolerances.yaw,
        };
        let overall_match =
            within_tolerance.roll && within_tolerance.pitch && within_tolerance.yaw;

        let mut adjustments = Vec::new();
        if !within_tolerance.roll {
            adjustments.push(Adjustment {
                axis: Axis::Roll,
                direction: if differences.roll > 0.0 {
                    Direction::Left
                } else {
                    Direction::Right
                },
                amount: deviations.roll,
            });
        }
        if !within_tolerance.pitch {
            adjustments.push(Adjustment {
                axis: Axis::Pitch,
                direction: if differences.pitch > 0.0 {
                    Direction::Down
                } else {
                    Direction::Up
                },
                amount: deviations.pitch,
            });
        }
        if !within_tolerance.yaw {
            adjustments.push(Adjustment {
                axis: Axis::Yaw,
                direction: if differences.yaw > 0.0 {
                    Direction::Left
                } else {
                    Direction::Right
                },
                amount: deviations.yaw,
            });
        }

        let match_percentage = self.match_percentage(deviations);

        PoseComparison {
            differences,
            deviations,
            within_tolerance,
            overall_match,
            adjustments,
            match_percentage,
        }
    }

    /// Each axis scores linearly from 1 at zero deviation down to 0 at twice
    /// its tolerance; the percentage is the rounded mean of the three.
    fn match_percentage(&self, deviations: PoseAngles) -> f32 {
        let roll = (1.0 - deviations.roll / (self.tolerances.roll * 2.0)).max(0.0);
        let pitch = (1.0 - deviations.pitch / (self.tolerances.pitch * 2.0)).max(0.0);
        let yaw = (1.0 - deviations.yaw / (self.tolerances.yaw * 2.0)).max(0.0);
        ((roll + pitch + yaw) / 3.0 * 100.0).round()
    }

    /// Pick the largest failing deviation (earliest axis wins ties) and turn
    /// it into a single human-readable instruction.
    pub fn generate_guidance(&self, comparison: &PoseComparison) -> Guidance {
        if comparison.overall_match {
            return Guidance {
                message: "Great, this matches your before pose".to_string(),
                kind: GuidanceKind::Success,
            };
        }

        let Some(primary) = comparison
            .adjustments
            .iter()
            .fold(None::<&Adjustment>, |best, adj| match best {
                Some(b) if adj.amount > b.amount => Some(adj),
                Some(b) => Some(b),
                None => Some(adj),
            })
        else {
            return Guidance {
                message: "Adjust your pose".to_string(),
                kind: GuidanceKind::Warning,
            };
        };

        let instruction = match (primary.axis, primary.direction) {
            (Axis::Roll, Direction::Left) => "Tilt your head to the left",
            (Axis::Roll, Direction::Right) => "Tilt your head to the right",
            (Axis::Pitch, Direction::Up) => "Tilt your face up slightly",
            (Axis::Pitch, Direction::Down) => "Tilt your face down slightly",
            (Axis::Yaw, Direction::Left) => "Turn your face to the left",
            (Axis::Yaw, Direction::Right) => "Turn your face to the right",
            _ => "Adjust your pose",
        };

        Guidance {
            message: format!("{} ({:.1}\u{b0} off)", instruction, primary.amount),
            kind: GuidanceKind::Reference,
        }
    }

    /// Multi-line debug dump of a comparison.
    pub fn comparison_summary(&self, comparison: &PoseComparison) -> String {
        format!(
            "match: {:.0}%\nroll diff: {:.2}\u{b0} (dev {:.2}\u{b0})\npitch diff: {:.2}\u{b0} (dev {:.2}\u{b0})\nyaw diff: {:.2}\u{b0} (dev {:.2}\u{b0})",
            comparison.match_percentage,
            comparison.differences.roll,
            comparison.deviations.roll,
            comparison.differences.pitch,
            comparison.deviations.pitch,
            comparison.differences.yaw,
            comparison.deviations.yaw,
        )
    }
}
