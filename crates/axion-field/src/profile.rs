//! Transverse field profiles along a segment

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_non_negative, ensure_positive, AxionError, AxionResult};
use crate::field::FieldSampler;
use crate::geometry::{transverse_component, Segment};

/// Sample count used when the caller does not pick one
pub const DEFAULT_PROFILE_SAMPLES: usize = 10_000;

/// Upper bound on samples per segment
pub const MAX_PROFILE_SAMPLES: usize = 10_000_000;

/// How densely a segment is sampled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileResolution {
    /// Fixed number of samples, endpoints included
    Samples(usize),
    /// Samples no further apart than this many mm
    Step(f64),
}

impl Default for ProfileResolution {
    fn default() -> Self {
        ProfileResolution::Samples(DEFAULT_PROFILE_SAMPLES)
    }
}

impl ProfileResolution {
    /// Number of samples for a segment of the given length (mm)
    pub fn sample_count(&self, length: f64) -> AxionResult<usize> {
        let n = match *self {
            ProfileResolution::Samples(n) if n < 2 => return Err(AxionError::ProfileTooShort(n)),
            ProfileResolution::Samples(n) => n as f64,
            ProfileResolution::Step(step) => {
                ensure_positive("profile_step", step)?;
                ensure_non_negative("segment_length", length)?;
                ((length / step).ceil() + 1.0).max(2.0)
            }
        };
        if n > MAX_PROFILE_SAMPLES as f64 {
            return Err(AxionError::InvalidParameter {
                name: "profile_samples",
                value: n,
                reason: "exceeds the per-segment sample limit",
            });
        }
        Ok(n as usize)
    }
}

/// Evenly spaced transverse field magnitudes (T) over a segment of
/// `length` mm. The first and last samples sit on the segment endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProfile {
    samples: Vec<f64>,
    length: f64,
}

impl FieldProfile {
    pub fn new(samples: Vec<f64>, length: f64) -> AxionResult<Self> {
        if samples.len() < 2 {
            return Err(AxionError::ProfileTooShort(samples.len()));
        }
        ensure_non_negative("segment_length", length)?;
        for &b in &samples {
            ensure_finite("field_sample", b)?;
        }
        Ok(Self { samples, length })
    }

    /// Constant field `b` over `length` mm
    pub fn uniform(b: f64, length: f64, n: usize) -> AxionResult<Self> {
        Self::new(vec![b; n], length)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Segment length in mm
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Distance between neighbouring samples in mm
    pub fn spacing(&self) -> f64 {
        self.length / (self.samples.len() - 1) as f64
    }

    /// Arithmetic mean of the samples
    pub fn average(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Turns a geometric segment into a numeric field series.
pub struct FieldProfileSampler<'f> {
    field: &'f dyn FieldSampler,
}

impl<'f> FieldProfileSampler<'f> {
    pub fn new(field: &'f dyn FieldSampler) -> Self {
        Self { field }
    }

    /// `n` samples of the field component transverse to `direction`,
    /// linearly interpolating position from `entry` to `exit`.
    pub fn sample(
        &self,
        entry: &Point3<f64>,
        exit: &Point3<f64>,
        direction: &Vector3<f64>,
        n: usize,
    ) -> AxionResult<FieldProfile> {
        if n < 2 {
            return Err(AxionError::ProfileTooShort(n));
        }
        let segment = Segment::new(*entry, *exit);
        let last = (n - 1) as f64;
        let samples = (0..n)
            .map(|i| {
                let position = segment.point_at(i as f64 / last);
                transverse_component(&self.field.field_at(&position), direction)
            })
            .collect();
        FieldProfile::new(samples, segment.length())
    }

    pub fn sample_with_resolution(
        &self,
        entry: &Point3<f64>,
        exit: &Point3<f64>,
        direction: &Vector3<f64>,
        resolution: ProfileResolution,
    ) -> AxionResult<FieldProfile> {
        let n = resolution.sample_count((exit - entry).norm())?;
        self.sample(entry, exit, direction, n)
    }

    pub fn sample_segment(
        &self,
        segment: &Segment,
        direction: &Vector3<f64>,
        resolution: ProfileResolution,
    ) -> AxionResult<FieldProfile> {
        self.sample_with_resolution(&segment.entry, &segment.exit, direction, resolution)
    }
}
