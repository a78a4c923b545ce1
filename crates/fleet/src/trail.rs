//! Breadcrumb trail of recent positions, used by followers.

use commander_domain::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    /// Newest first
    points: VecDeque<Vec3>,
    spacing_m: f64,
    capacity: usize,
}

impl Trail {
    pub fn new(spacing_m: f64, capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            spacing_m: spacing_m.max(0.0),
            capacity: capacity.max(2),
        }
    }

    /// Record `position` if it moved at least one spacing from the newest point.
    pub fn record(&mut self, position: Vec3) {
        let far_enough = self
            .points
            .front()
            .map_or(true, |last| last.distance_to(&position) >= self.spacing_m);
        if far_enough {
            self.points.push_front(position);
            self.points.truncate(self.capacity);
        }
    }

    /// Point `distance` metres back along the path ending at `current`.
    /// Past the oldest breadcrumb the path is extended straight back along
    /// `heading`.
    pub fn point_behind(&self, current: Vec3, distance: f64, heading: f64) -> Vec3 {
        let mut remaining = distance.max(0.0);
        let mut from = current;
        for &point in &self.points {
            if remaining <= 0.0 {
                return from;
            }
            let segment = from.distance_to(&point);
            if segment > 0.0 && segment >= remaining {
                return from + (point - from) * (remaining / segment);
            }
            remaining -= segment;
            from = point;
        }
        from + Vec3::new(-heading.cos(), -heading.sin(), 0.0) * remaining
    }

    pub fn points(&self) -> impl Iterator<Item = &Vec3> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.distance_to(&b) < 1e-9
    }

    #[test]
    fn records_at_spacing_and_caps_length() {
        let mut trail = Trail::new(1.0, 3);
        trail.record(Vec3::new(0.0, 0.0, 0.0));
        trail.record(Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(trail.len(), 1);
        for x in 1..6 {
            trail.record(Vec3::new(x as f64, 0.0, 0.0));
        }
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.points().next(), Some(&Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn point_behind_walks_around_corners() {
        let mut trail = Trail::new(0.5, 100);
        // East along y = 0 then north along x = 10.
        for x in 0..=10 {
            trail.record(Vec3::new(x as f64, 0.0, 0.0));
        }
        for y in 1..=4 {
            trail.record(Vec3::new(10.0, y as f64, 0.0));
        }
        let current = Vec3::new(10.0, 4.0, 0.0);
        let target = trail.point_behind(current, 6.0, std::f64::consts::FRAC_PI_2);
        // 4 m back down the north leg, 2 m back along the east leg.
        assert!(approx(target, Vec3::new(8.0, 0.0, 0.0)), "{target:?}");
    }

    #[test]
    fn short_trail_extrapolates_along_heading() {
        let mut trail = Trail::new(0.5, 100);
        trail.record(Vec3::new(0.0, 0.0, 0.0));
        let target = trail.point_behind(Vec3::new(0.0, 0.0, 0.0), 3.0, 0.0);
        assert!(approx(target, Vec3::new(-3.0, 0.0, 0.0)), "{target:?}");

        let empty = Trail::new(0.5, 100);
        let target = empty.point_behind(Vec3::new(5.0, 5.0, 0.0), 2.0, std::f64::consts::FRAC_PI_2);
        assert!(approx(target, Vec3::new(5.0, 3.0, 0.0)), "{target:?}");
    }
}
