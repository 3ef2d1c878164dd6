//! Magnetic field sampling
//!
//! A magnet is described as a set of volumes ("regions"). Each volume is an
//! axis-aligned box holding either a uniform field or a regular grid of field
//! vectors. Outside every volume the field is exactly zero, which is what the
//! boundary tracer relies on to find region edges.

use nalgebra::{Point3, Vector3};

use crate::error::{AxionError, AxionResult};

/// Anything that can report the magnetic field (T) at a position (mm).
///
/// Implementations must return an exact zero vector outside their field
/// regions and must be safe to call from several threads at once.
pub trait FieldSampler: Send + Sync {
    fn field_at(&self, position: &Point3<f64>) -> Vector3<f64>;

    fn is_zero_at(&self, position: &Point3<f64>) -> bool {
        self.field_at(position) == Vector3::zeros()
    }
}

impl<F> FieldSampler for F
where
    F: Fn(&Point3<f64>) -> Vector3<f64> + Send + Sync,
{
    fn field_at(&self, position: &Point3<f64>) -> Vector3<f64> {
        self(position)
    }
}

/// Regular grid of field vectors spanning a volume's bounding box.
///
/// Values are stored x-fastest: `index = i + nx * (j + ny * k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGrid {
    nodes: [usize; 3],
    values: Vec<Vector3<f64>>,
}

impl FieldGrid {
    pub fn new(nodes: [usize; 3], values: Vec<Vector3<f64>>) -> AxionResult<Self> {
        if nodes.iter().any(|&n| n < 2) {
            return Err(AxionError::InvalidGrid(format!(
                "every axis needs at least 2 nodes, got {:?}",
                nodes
            )));
        }
        let expected = nodes[0] * nodes[1] * nodes[2];
        if values.len() != expected {
            return Err(AxionError::InvalidGrid(format!(
                "expected {} field values for {:?} nodes, got {}",
                expected,
                nodes,
                values.len()
            )));
        }
        if values.iter().any(|v| v.iter().any(|c| !c.is_finite())) {
            return Err(AxionError::InvalidGrid("field values must be finite".to_string()));
        }
        Ok(Self { nodes, values })
    }

    pub fn nodes(&self) -> [usize; 3] {
        self.nodes
    }

    fn value(&self, i: usize, j: usize, k: usize) -> Vector3<f64> {
        self.values[i + self.nodes[0] * (j + self.nodes[1] * k)]
    }

    /// Trilinear interpolation at fractional coordinates in [0, 1]^3.
    fn interpolate(&self, frac: [f64; 3]) -> Vector3<f64> {
        let mut cell = [0usize; 3];
        let mut weight = [0.0; 3];
        for axis in 0..3 {
            let span = (self.nodes[axis] - 1) as f64;
            let x = frac[axis].clamp(0.0, 1.0) * span;
            let lower = (x.floor() as usize).min(self.nodes[axis] - 2);
            cell[axis] = lower;
            weight[axis] = x - lower as f64;
        }
        let [i, j, k] = cell;
        let [wx, wy, wz] = weight;

        let c00 = self.value(i, j, k) * (1.0 - wx) + self.value(i + 1, j, k) * wx;
        let c10 = self.value(i, j + 1, k) * (1.0 - wx) + self.value(i + 1, j + 1, k) * wx;
        let c01 = self.value(i, j, k + 1) * (1.0 - wx) + self.value(i + 1, j, k + 1) * wx;
        let c11 = self.value(i, j + 1, k + 1) * (1.0 - wx) + self.value(i + 1, j + 1, k + 1) * wx;

        let c0 = c00 * (1.0 - wy) + c10 * wy;
        let c1 = c01 * (1.0 - wy) + c11 * wy;
        c0 * (1.0 - wz) + c1 * wz
    }
}

/// Field distribution inside a volume
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Uniform(Vector3<f64>),
    Grid(FieldGrid),
}

/// One magnet region
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetVolume {
    pub name: String,
    min: Point3<f64>,
    max: Point3<f64>,
    shape: FieldShape,
}

impl MagnetVolume {
    pub fn new(name: impl Into<String>, min: Point3<f64>, max: Point3<f64>, shape: FieldShape) -> AxionResult<Self> {
        for axis in 0..3 {
            if !(min[axis].is_finite() && max[axis].is_finite()) || min[axis] >= max[axis] {
                return Err(AxionError::InvalidGrid(format!(
                    "volume bounds must be finite with min < max on every axis, got {:?} .. {:?}",
                    min, max
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            min,
            max,
            shape,
        })
    }

    /// Box of constant field
    pub fn uniform(name: impl Into<String>, min: Point3<f64>, max: Point3<f64>, field: Vector3<f64>) -> AxionResult<Self> {
        Self::new(name, min, max, FieldShape::Uniform(field))
    }

    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        (self.min, self.max)
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Field at `p`, or `None` when `p` lies outside this volume.
    pub fn field_at(&self, p: &Point3<f64>) -> Option<Vector3<f64>> {
        if !self.contains(p) {
            return None;
        }
        Some(match &self.shape {
            FieldShape::Uniform(b) => *b,
            FieldShape::Grid(grid) => {
                let mut frac = [0.0; 3];
                for (axis, f) in frac.iter_mut().enumerate() {
                    *f = (p[axis] - self.min[axis]) / (self.max[axis] - self.min[axis]);
                }
                grid.interpolate(frac)
            }
        })
    }
}

/// A magnet made of one or more volumes.
///
/// Where volumes overlap the first one listed wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnetField {
    volumes: Vec<MagnetVolume>,
}

impl MagnetField {
    pub fn new(volumes: Vec<MagnetVolume>) -> Self {
        Self { volumes }
    }

    pub fn volumes(&self) -> &[MagnetVolume] {
        &self.volumes
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

impl FieldSampler for MagnetField {
    fn field_at(&self, position: &Point3<f64>) -> Vector3<f64> {
        self.volumes
            .iter()
            .find_map(|v| v.field_at(position))
            .unwrap_or_else(Vector3::zeros)
    }
}
