//! Rays, field segments and axis helpers
//!
//! All lengths are in mm.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{AxionError, AxionResult};

/// World coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis carrying the largest absolute component of `v`.
    /// Ties resolve in X, Y, Z order.
    pub fn dominant(v: &Vector3<f64>) -> Axis {
        let abs = v.abs();
        if abs.x >= abs.y && abs.x >= abs.z {
            Axis::X
        } else if abs.y >= abs.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

/// A particle trajectory: start position plus travel direction.
///
/// The direction does not need to be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub position: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    pub fn new(position: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { position, direction }
    }

    /// Ray travelling along a single world axis, `sense` is +1 or -1.
    pub fn along(axis: Axis, sense: f64, position: Point3<f64>) -> Self {
        let mut direction = Vector3::zeros();
        direction[axis.index()] = sense.signum();
        Self { position, direction }
    }

    /// The world axis this ray runs parallel to, if any.
    pub fn parallel_axis(&self) -> Option<Axis> {
        let d = &self.direction;
        match (d.x != 0.0, d.y != 0.0, d.z != 0.0) {
            (true, false, false) => Some(Axis::X),
            (false, true, false) => Some(Axis::Y),
            (false, false, true) => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn validate(&self) -> AxionResult<()> {
        let finite = self.position.coords.iter().all(|c| c.is_finite())
            && self.direction.iter().all(|c| c.is_finite());
        if !finite || self.direction == Vector3::zeros() {
            return Err(AxionError::DegenerateDirection([
                self.direction.x,
                self.direction.y,
                self.direction.z,
            ]));
        }
        Ok(())
    }
}

/// One contiguous stretch of non-zero field along a ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub entry: Point3<f64>,
    pub exit: Point3<f64>,
}

impl Segment {
    pub fn new(entry: Point3<f64>, exit: Point3<f64>) -> Self {
        Self { entry, exit }
    }

    pub fn length(&self) -> f64 {
        (self.exit - self.entry).norm()
    }

    /// Point at parametric position `t` in [0, 1]; both ends are exact.
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        if t <= 0.0 {
            self.entry
        } else if t >= 1.0 {
            self.exit
        } else {
            self.entry + (self.exit - self.entry) * t
        }
    }
}

/// Magnitude of the part of `field` perpendicular to `direction`.
///
/// A zero direction has no preferred axis, so the full magnitude is returned.
pub fn transverse_component(field: &Vector3<f64>, direction: &Vector3<f64>) -> f64 {
    let norm = direction.norm();
    if norm == 0.0 {
        return field.norm();
    }
    let unit = direction / norm;
    (field - unit * field.dot(&unit)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_axis() {
        assert_eq!(Axis::dominant(&Vector3::new(0.1, -0.9, 0.3)), Axis::Y);
        assert_eq!(Axis::dominant(&Vector3::new(0.0, 0.0, -1.0)), Axis::Z);
        assert_eq!(Axis::dominant(&Vector3::new(1.0, 1.0, 0.0)), Axis::X);
    }

    #[test]
    fn test_parallel_axis() {
        let ray = Ray::along(Axis::Z, -1.0, Point3::origin());
        assert_eq!(ray.parallel_axis(), Some(Axis::Z));
        assert_eq!(ray.direction.z, -1.0);

        let oblique = Ray::new(Point3::origin(), Vector3::new(0.1, 0.0, -1.0));
        assert_eq!(oblique.parallel_axis(), None);
    }

    #[test]
    fn test_degenerate_ray_rejected() {
        let ray = Ray::new(Point3::origin(), Vector3::zeros());
        assert!(matches!(ray.validate(), Err(AxionError::DegenerateDirection(_))));

        let ray = Ray::new(Point3::new(f64::NAN, 0.0, 0.0), Vector3::x());
        assert!(ray.validate().is_err());
    }

    #[test]
    fn test_segment_endpoints_exact() {
        let seg = Segment::new(Point3::new(0.1, 0.2, 0.3), Point3::new(7.7, -3.1, 9.9));
        assert_eq!(seg.point_at(0.0), seg.entry);
        assert_eq!(seg.point_at(1.0), seg.exit);
        let mid = seg.point_at(0.5);
        assert!((mid.x - 3.9).abs() < 1e-12);
    }

    #[test]
    fn test_transverse_component() {
        let field = Vector3::new(3.0, 0.0, 4.0);
        // Travelling along z: only Bx is transverse
        assert!((transverse_component(&field, &Vector3::new(0.0, 0.0, -2.0)) - 3.0).abs() < 1e-12);
        // Travelling along x: only Bz is transverse
        assert!((transverse_component(&field, &Vector3::x()) - 4.0).abs() < 1e-12);
        assert!((transverse_component(&field, &Vector3::zeros()) - 5.0).abs() < 1e-12);
    }
}
