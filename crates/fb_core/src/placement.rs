//! Starting-position policy: shirt number -> kickoff-side pose.

use std::collections::BTreeMap;

use crate::config::StartingPosition;
use crate::error::PlacementError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub orientation: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StartingPositions {
    by_number: BTreeMap<u8, Pose>,
}

impl StartingPositions {
    pub fn new(table: &[StartingPosition]) -> Self {
        let by_number = table
            .iter()
            .map(|p| {
                (
                    p.number,
                    Pose {
                        x: p.x,
                        y: p.y,
                        orientation: p.orientation,
                    },
                )
            })
            .collect();
        Self { by_number }
    }

    pub fn pose_for(&self, number: u8) -> Result<Pose, PlacementError> {
        self.by_number
            .get(&number)
            .copied()
            .ok_or(PlacementError::UnknownPlayerNumber(number))
    }
}
