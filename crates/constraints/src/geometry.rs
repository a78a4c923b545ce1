//! Planar polygon tests used by the no-go check.

use commander_domain::Point2;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn from_points(points: &[Point2]) -> Option<Rect> {
        let first = points.first()?;
        let mut rect = Rect {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            rect.min_x = rect.min_x.min(p.x);
            rect.min_y = rect.min_y.min(p.y);
            rect.max_x = rect.max_x.max(p.x);
            rect.max_y = rect.max_y.max(p.y);
        }
        Some(rect)
    }

    pub fn expanded(&self, margin: f64) -> Rect {
        Rect {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn corners(&self) -> [Point2; 4] {
        [
            Point2::new(self.min_x, self.min_y),
            Point2::new(self.min_x, self.max_y),
            Point2::new(self.max_x, self.max_y),
            Point2::new(self.max_x, self.min_y),
        ]
    }

    /// Nearest point on the rectangle boundary; for outside points this is
    /// the clamped point.
    pub fn nearest_boundary_point(&self, p: Point2) -> Point2 {
        if !self.contains(p) {
            return Point2::new(p.x.clamp(self.min_x, self.max_x), p.y.clamp(self.min_y, self.max_y));
        }
        let candidates = [
            (p.x - self.min_x, Point2::new(self.min_x, p.y)),
            (self.max_x - p.x, Point2::new(self.max_x, p.y)),
            (p.y - self.min_y, Point2::new(p.x, self.min_y)),
            (self.max_y - p.y, Point2::new(p.x, self.max_y)),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.0 < best.0 {
                best = *candidate;
            }
        }
        best.1
    }
}

/// Even-odd ray cast. Points exactly on an edge may land either side.
pub fn point_in_polygon(p: Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
    p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}

fn orientation(o: Point2, a: Point2, b: Point2) -> i8 {
    let c = cross(o, a, b);
    if c > EPS {
        1
    } else if c < -EPS {
        -1
    } else {
        0
    }
}

/// Closed-segment intersection, touching and collinear overlap included.
pub fn segments_intersect(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }
    (d1 == 0 && on_segment(q1, q2, p1))
        || (d2 == 0 && on_segment(q1, q2, p2))
        || (d3 == 0 && on_segment(p1, p2, q1))
        || (d4 == 0 && on_segment(p1, p2, q2))
}

/// True if segment `a -> b` enters, crosses or ends inside the polygon.
pub fn segment_intersects_polygon(a: Point2, b: Point2, polygon: &[Point2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    if point_in_polygon(a, polygon) || point_in_polygon(b, polygon) {
        return true;
    }
    let n = polygon.len();
    (0..n).any(|i| segments_intersect(a, b, polygon[i], polygon[(i + 1) % n]))
}
