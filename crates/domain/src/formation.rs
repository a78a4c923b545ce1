//! Formation geometry.
//!
//! Slot offsets are expressed in the leader's body frame: +x forward, +y left.
//! A slot's world position is the leader position plus the offset rotated by
//! the leader heading.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationType {
    /// Rank abreast, one spacing behind the leader
    #[default]
    Line,
    /// Echelons spreading back and out on alternating sides
    Wedge,
    /// Single file behind the leader
    Column,
}

impl FormationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormationType::Line => "line",
            FormationType::Wedge => "wedge",
            FormationType::Column => "column",
        }
    }

    /// Body-frame offset of follower slot `index` (0-based).
    pub fn offset(&self, index: usize, spacing: f64) -> Vec3 {
        let side = if index % 2 == 0 { 1.0 } else { -1.0 };
        match self {
            FormationType::Line => {
                let rank = (index / 2 + 1) as f64;
                Vec3::new(-spacing, side * spacing * rank, 0.0)
            }
            FormationType::Wedge => {
                let row = (index / 2 + 1) as f64;
                Vec3::new(-spacing * row, side * spacing * row * 0.5, 0.0)
            }
            FormationType::Column => Vec3::new(-spacing * (index as f64 + 1.0), 0.0, 0.0),
        }
    }

    pub fn offsets(&self, count: usize, spacing: f64) -> Vec<Vec3> {
        (0..count).map(|i| self.offset(i, spacing)).collect()
    }

    /// World position of a slot given the leader pose.
    pub fn slot_position(&self, leader: Vec3, heading: f64, index: usize, spacing: f64) -> Vec3 {
        leader + self.offset(index, spacing).rotated_2d(heading)
    }
}
