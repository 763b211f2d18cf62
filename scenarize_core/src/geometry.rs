// scenarize_core/src/geometry.rs

//! Lightweight planar geometry for goal-region synthesis.
//!
//! Just enough polyline and polygon machinery to project onto lane
//! centerlines, cut lane sections and compare areas. Arclengths are in the
//! units of the underlying map (meters for all supported datasets).

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// An open polyline with at least two distinct points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point2<f64>>,
}

impl Polyline {
    /// Exactly repeated consecutive points are dropped so projections never
    /// divide by a zero segment length.
    pub fn new(points: Vec<Point2<f64>>) -> Result<Self> {
        let mut deduped: Vec<Point2<f64>> = Vec::with_capacity(points.len());
        for p in points {
            if deduped.last() != Some(&p) {
                deduped.push(p);
            }
        }
        if deduped.len() < 2 {
            return Err(ConvertError::MalformedWindow(
                "polyline needs at least two distinct points".into(),
            ));
        }
        Ok(Self { points: deduped })
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).norm())
            .sum()
    }

    /// Arclength of the closest point on the polyline to `p`.
    pub fn project(&self, p: Point2<f64>) -> f64 {
        let mut best_dist = f64::INFINITY;
        let mut best_s = 0.0;
        let mut offset = 0.0;
        for pair in self.points.windows(2) {
            let seg: Vector2<f64> = pair[1] - pair[0];
            let seg_len = seg.norm();
            let t = ((p - pair[0]).dot(&seg) / (seg_len * seg_len)).clamp(0.0, 1.0);
            let closest = pair[0] + seg * t;
            let dist = (p - closest).norm();
            if dist < best_dist {
                best_dist = dist;
                best_s = offset + t * seg_len;
            }
            offset += seg_len;
        }
        best_s
    }

    /// Point at arclength `s`, clamped to the polyline's extent.
    pub fn interpolate(&self, s: f64) -> Point2<f64> {
        if s <= 0.0 {
            return self.points[0];
        }
        let mut remaining = s;
        for pair in self.points.windows(2) {
            let seg: Vector2<f64> = pair[1] - pair[0];
            let seg_len = seg.norm();
            if remaining <= seg_len {
                return pair[0] + seg * (remaining / seg_len);
            }
            remaining -= seg_len;
        }
        self.points[self.points.len() - 1]
    }
}

/// A simple polygon, vertices in order, implicitly closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Point2<f64>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2<f64>>) -> Result<Self> {
        let mut deduped: Vec<Point2<f64>> = Vec::with_capacity(vertices.len());
        for p in vertices {
            if deduped.last() != Some(&p) {
                deduped.push(p);
            }
        }
        if deduped.first() == deduped.last() && deduped.len() > 1 {
            deduped.pop();
        }
        if deduped.len() < 3 {
            return Err(ConvertError::MalformedWindow(
                "polygon needs at least three distinct vertices".into(),
            ));
        }
        Ok(Self { vertices: deduped })
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    /// Unsigned shoelace area.
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            twice += a.x * b.y - b.x * a.y;
        }
        twice.abs() / 2.0
    }

    /// Area centroid. Falls back to the vertex mean for degenerate polygons.
    pub fn centroid(&self) -> Point2<f64> {
        let n = self.vertices.len();
        let mut twice = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let cross = a.x * b.y - b.x * a.y;
            twice += cross;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }
        if twice.abs() < f64::EPSILON {
            let sum = self
                .vertices
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.coords);
            return Point2::from(sum / n as f64);
        }
        Point2::new(cx / (3.0 * twice), cy / (3.0 * twice))
    }

    /// Even-odd ray-cast point containment. Points on an edge may land on
    /// either side; the pipeline never depends on boundary inclusion.
    pub fn contains(&self, p: Point2<f64>) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > p.y) != (b.y > p.y)
                && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// An axis-oblique rectangle given by center, extents and heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    pub center: Point2<f64>,
    pub length: f64,
    pub width: f64,
    pub orientation: f64,
}

impl OrientedBox {
    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    /// Corner points, counter-clockwise starting at the front-left.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let (sin, cos) = self.orientation.sin_cos();
        let lon = Vector2::new(cos, sin) * (self.length / 2.0);
        let lat = Vector2::new(-sin, cos) * (self.width / 2.0);
        [
            self.center + lon + lat,
            self.center - lon + lat,
            self.center - lon - lat,
            self.center + lon - lat,
        ]
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon {
            vertices: self.corners().to_vec(),
        }
    }
}
