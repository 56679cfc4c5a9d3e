//! Planar geometry helpers shared by relaxation, triangulation and deformation.

use geo::{Centroid, Coord, Distance as _, Euclidean, LineString, Point, Polygon};

/// Euclidean distance between two coordinates.
pub fn dist_2d(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(Point::from(a), Point::from(b))
}

/// Distance from `p` to the infinite line through `a` and `b`.
///
/// When `a` and `b` coincide the line is undefined and the distance to `a` is returned.
pub fn dist_line_point(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let length = dist_2d(a, b);
    if length == 0.0 {
        return dist_2d(p, a);
    }
    cross(a, b, p).abs() / length
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise.
pub fn cross(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Circle through three points, stored as centre and squared radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circumcircle {
    pub center: Coord<f64>,
    pub radius_sq: f64,
}

impl Circumcircle {
    /// Computes the circumcircle of `abc`.
    ///
    /// Collinear input has no finite circle; the result is centred on the triangle
    /// centroid with an infinite radius so that it contains every point.
    pub fn of(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Self {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < f64::EPSILON {
            return Self {
                center: Coord {
                    x: (a.x + b.x + c.x) / 3.0,
                    y: (a.y + b.y + c.y) / 3.0,
                },
                radius_sq: f64::INFINITY,
            };
        }

        let a2 = a.x * a.x + a.y * a.y;
        let b2 = b.x * b.x + b.y * b.y;
        let c2 = c.x * c.x + c.y * c.y;
        let center = Coord {
            x: (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            y: (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        };
        let dx = a.x - center.x;
        let dy = a.y - center.y;

        Self {
            center,
            radius_sq: dx * dx + dy * dy,
        }
    }

    /// True when `p` lies strictly inside the circle.
    pub fn contains(&self, p: Coord<f64>) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        dx * dx + dy * dy < self.radius_sq
    }
}

/// Area centroid of the polygon whose vertices are `ring`, in order.
///
/// Returns `None` for an empty ring.
pub fn polygon_centroid(ring: &[Coord<f64>]) -> Option<Coord<f64>> {
    if ring.is_empty() {
        return None;
    }
    let polygon = Polygon::new(LineString::from(ring.to_vec()), vec![]);
    polygon.centroid().map(|p| p.0)
}
