//! Field boundary tracing
//!
//! Walks a ray through a [`FieldSampler`] and reports every contiguous stretch
//! of non-zero field it crosses. The search starts on a far plane upstream of
//! any magnet, steps forward coarsely until the field state changes and then
//! bisects the last step down to the requested resolution. Both entry and exit
//! boundaries are refined.
//!
//! The ray is parametrised by its coordinate `u` along its dominant axis. For
//! rays parallel to a world axis this is the plain 1D coordinate; otherwise the
//! other two coordinates follow by linear interpolation. Every probe is kept
//! inside `|u| <= world_half_extent`, which is what guarantees termination for
//! samplers that never return a non-zero field.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_positive, AxionError, AxionResult};
use crate::field::FieldSampler;
use crate::geometry::{Axis, Ray, Segment};

/// Default terminal step (mm)
pub const DEFAULT_MIN_STEP: f64 = 0.01;
/// Default initial search step (mm)
pub const DEFAULT_COARSE_STEP: f64 = 5.0;
/// Distance of the starting plane from the origin (mm)
pub const DEFAULT_START_OFFSET: f64 = 25_000.0;
/// Half size of the world box probes may not leave (mm)
pub const DEFAULT_WORLD_HALF_EXTENT: f64 = 40_000.0;

/// Non-fatal anomalies found while tracing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceDiagnostic {
    /// The ray climbs along the vertical axis instead of travelling toward
    /// or across the magnet.
    AscendingRay { axis: Axis, component: f64 },
}

/// Ordered field segments crossed by a ray.
///
/// Every segment runs from the first to the last in-field position found
/// along the ray. The world-box exit is not stored as a trailing pair with a
/// zero-vector end; it is kept apart in [`BoundaryList::exit_position`], so
/// the segment list only ever holds real field stretches.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryList {
    segments: Vec<Segment>,
    /// Last probe position before the search left the world box
    exit_position: Point3<f64>,
    diagnostics: Vec<TraceDiagnostic>,
}

impl BoundaryList {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Where the trace left the world box. No segment lies beyond it.
    pub fn exit_position(&self) -> Point3<f64> {
        self.exit_position
    }

    pub fn diagnostics(&self) -> &[TraceDiagnostic] {
        &self.diagnostics
    }

    /// Sum of segment lengths (mm)
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(Segment::length).sum()
    }

}

impl<'a> IntoIterator for &'a BoundaryList {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Search settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerSettings {
    pub coarse_step: f64,
    pub start_offset: f64,
    pub world_half_extent: f64,
    /// Rays must not travel upward along this axis
    pub vertical_axis: Axis,
}

impl Default for TracerSettings {
    fn default() -> Self {
        Self {
            coarse_step: DEFAULT_COARSE_STEP,
            start_offset: DEFAULT_START_OFFSET,
            world_half_extent: DEFAULT_WORLD_HALF_EXTENT,
            vertical_axis: Axis::Z,
        }
    }
}

/// Smallest step that still moves a probe anywhere inside a world box of
/// the given half extent.
pub fn min_resolvable_step(world_half_extent: f64) -> f64 {
    world_half_extent * f64::EPSILON * 4.0
}

fn ensure_resolvable(name: &'static str, step: f64, world_half_extent: f64) -> AxionResult<()> {
    ensure_positive(name, step)?;
    if step < min_resolvable_step(world_half_extent) {
        return Err(AxionError::InvalidParameter {
            name,
            value: step,
            reason: "below the floating point resolution of the world box",
        });
    }
    Ok(())
}

impl TracerSettings {
    pub fn validate(&self) -> AxionResult<()> {
        ensure_positive("world_half_extent", self.world_half_extent)?;
        ensure_resolvable("coarse_step", self.coarse_step, self.world_half_extent)?;
        ensure_positive("start_offset", self.start_offset)?;
        if self.start_offset >= self.world_half_extent {
            return Err(AxionError::InvalidParameter {
                name: "start_offset",
                value: self.start_offset,
                reason: "must lie inside the world box",
            });
        }
        Ok(())
    }
}

/// Ray parametrised by its coordinate along the dominant axis
struct TraceLine {
    origin: Point3<f64>,
    direction: Vector3<f64>,
    axis: Axis,
    parallel: bool,
}

impl TraceLine {
    fn new(ray: &Ray) -> Self {
        Self {
            origin: ray.position,
            direction: ray.direction,
            axis: Axis::dominant(&ray.direction),
            parallel: ray.parallel_axis().is_some(),
        }
    }

    /// +1 when `u` grows along the ray, -1 otherwise
    fn sense(&self) -> f64 {
        self.direction[self.axis.index()].signum()
    }

    fn at(&self, u: f64) -> Point3<f64> {
        let k = self.axis.index();
        if self.parallel {
            let mut p = self.origin;
            p[k] = u;
            return p;
        }
        let s = (u - self.origin[k]) / self.direction[k];
        let mut p = self.origin + self.direction * s;
        p[k] = u;
        p
    }
}

/// Outcome of one stepping search
enum Probe {
    /// Last position in the starting state and first position in the
    /// opposite one, at most `min_step` apart
    Boundary { last: f64, first: f64 },
    /// The next step would leave the world box; holds the last position
    LeftWorld(f64),
}

/// Locates field regions along rays.
pub struct BoundaryTracer<'f> {
    field: &'f dyn FieldSampler,
    settings: TracerSettings,
}

impl<'f> BoundaryTracer<'f> {
    pub fn new(field: &'f dyn FieldSampler) -> Self {
        Self::with_settings(field, TracerSettings::default())
    }

    pub fn with_settings(field: &'f dyn FieldSampler, settings: TracerSettings) -> Self {
        Self { field, settings }
    }

    pub fn settings(&self) -> &TracerSettings {
        &self.settings
    }

    /// Entry/exit pairs of every non-zero field segment along `ray`, resolved
    /// to within `min_step` mm along the dominant axis.
    pub fn trace(&self, ray: &Ray, min_step: f64) -> AxionResult<BoundaryList> {
        self.settings.validate()?;
        ensure_resolvable("min_step", min_step, self.settings.world_half_extent)?;
        ray.validate()?;

        let mut diagnostics = Vec::new();
        let vertical = self.settings.vertical_axis;
        let climb = ray.direction[vertical.index()];
        if climb > 0.0 {
            warn!(
                axis = ?vertical,
                component = climb,
                "ray ascends along the vertical axis, boundaries are best effort"
            );
            diagnostics.push(TraceDiagnostic::AscendingRay {
                axis: vertical,
                component: climb,
            });
        }

        let line = TraceLine::new(ray);
        let mut u = -line.sense() * self.settings.start_offset;
        let mut segments = Vec::new();

        let exit_u = loop {
            let entry = match self.probe(&line, u, min_step, false) {
                Probe::Boundary { first, .. } => first,
                Probe::LeftWorld(last) => break last,
            };
            match self.probe(&line, entry, min_step, true) {
                Probe::Boundary { last, first } => {
                    segments.push(Segment::new(line.at(entry), line.at(last)));
                    u = first;
                }
                Probe::LeftWorld(last) => {
                    if last != entry {
                        segments.push(Segment::new(line.at(entry), line.at(last)));
                    }
                    break last;
                }
            }
        };

        debug!(
            segments = segments.len(),
            axis = ?line.axis,
            "field boundaries traced"
        );

        Ok(BoundaryList {
            segments,
            exit_position: line.at(exit_u),
            diagnostics,
        })
    }

    fn in_field(&self, line: &TraceLine, u: f64) -> bool {
        !self.field.is_zero_at(&line.at(u))
    }

    /// Step from `from` while the field state equals `inside`, then bisect the
    /// overshooting step until it is no larger than `min_step`.
    fn probe(&self, line: &TraceLine, from: f64, min_step: f64, inside: bool) -> Probe {
        if self.in_field(line, from) != inside {
            return Probe::Boundary { last: from, first: from };
        }

        let sense = line.sense();
        let limit = self.settings.world_half_extent;
        let dr = self.settings.coarse_step;
        let mut last = from;
        let mut first = loop {
            let next = last + sense * dr;
            // A step lost to rounding would never reach the box edge
            if next.abs() > limit || next == last {
                return Probe::LeftWorld(last);
            }
            if self.in_field(line, next) != inside {
                break next;
            }
            last = next;
        };

        let mut gap = dr;
        while gap > min_step {
            gap /= 2.0;
            let mid = last + sense * gap;
            if mid == last || mid == first {
                break;
            }
            if self.in_field(line, mid) == inside {
                last = mid;
            } else {
                first = mid;
            }
        }
        Probe::Boundary { last, first }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{MagnetField, MagnetVolume};

    /// 1 T along y for x in [100, 200]
    fn slab(p: &Point3<f64>) -> Vector3<f64> {
        if p.x >= 100.0 && p.x <= 200.0 {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::zeros()
        }
    }

    #[test]
    fn test_step_function_boundaries() {
        let tracer = BoundaryTracer::new(&slab);
        let ray = Ray::along(Axis::X, 1.0, Point3::origin());
        let bounds = tracer.trace(&ray, DEFAULT_MIN_STEP).unwrap();

        assert_eq!(bounds.len(), 1);
        let seg = bounds.segments()[0];
        assert!((seg.entry.x - 100.0).abs() <= DEFAULT_MIN_STEP, "entry {}", seg.entry.x);
        assert!((seg.exit.x - 200.0).abs() <= DEFAULT_MIN_STEP, "exit {}", seg.exit.x);
        assert_eq!(seg.entry.y, 0.0);
        assert_eq!(seg.entry.z, 0.0);
        assert!(bounds.diagnostics().is_empty());
    }

    #[test]
    fn test_reverse_direction_swaps_entry_and_exit() {
        let tracer = BoundaryTracer::new(&slab);
        let ray = Ray::along(Axis::X, -1.0, Point3::new(0.0, 3.0, -4.0));
        let bounds = tracer.trace(&ray, DEFAULT_MIN_STEP).unwrap();

        assert_eq!(bounds.len(), 1);
        let seg = bounds.segments()[0];
        assert!((seg.entry.x - 200.0).abs() <= DEFAULT_MIN_STEP);
        assert!((seg.exit.x - 100.0).abs() <= DEFAULT_MIN_STEP);
        assert_eq!(seg.entry.y, 3.0);
    }

    #[test]
    fn test_zero_field_gives_empty_list() {
        let nothing = |_: &Point3<f64>| Vector3::<f64>::zeros();
        let tracer = BoundaryTracer::new(&nothing);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.2, 0.1, -1.0));
        let bounds = tracer.trace(&ray, DEFAULT_MIN_STEP).unwrap();

        assert!(bounds.is_empty());
        assert_eq!(bounds.total_length(), 0.0);
        // The search walked the whole world box downward along z
        let exit = bounds.exit_position();
        assert!(exit.z < -DEFAULT_WORLD_HALF_EXTENT + DEFAULT_COARSE_STEP);
        assert!(exit.z >= -DEFAULT_WORLD_HALF_EXTENT);
    }

    #[test]
    fn test_two_separate_regions() {
        let field = MagnetField::new(vec![
            MagnetVolume::uniform(
                "upper",
                Point3::new(-50.0, -50.0, 1000.0),
                Point3::new(50.0, 50.0, 3000.0),
                Vector3::new(3.0, 0.0, 0.0),
            )
            .unwrap(),
            MagnetVolume::uniform(
                "lower",
                Point3::new(-50.0, -50.0, -2500.0),
                Point3::new(50.0, 50.0, -500.0),
                Vector3::new(0.0, 3.0, 0.0),
            )
            .unwrap(),
        ]);
        let tracer = BoundaryTracer::new(&field);
        let ray = Ray::along(Axis::Z, -1.0, Point3::origin());
        let bounds = tracer.trace(&ray, 0.01).unwrap();

        assert_eq!(bounds.len(), 2);
        let upper = bounds.segments()[0];
        let lower = bounds.segments()[1];
        assert!((upper.entry.z - 3000.0).abs() <= 0.01);
        assert!((upper.exit.z - 1000.0).abs() <= 0.01);
        assert!((lower.entry.z + 500.0).abs() <= 0.01);
        assert!((lower.exit.z + 2500.0).abs() <= 0.01);
        assert!((bounds.total_length() - 4000.0).abs() <= 0.04);
    }

    #[test]
    fn test_oblique_ray_interpolates_coordinates() {
        let field = MagnetField::new(vec![MagnetVolume::uniform(
            "bore",
            Point3::new(-1000.0, -1000.0, -2000.0),
            Point3::new(1000.0, 1000.0, 2000.0),
            Vector3::new(0.0, 2.0, 0.0),
        )
        .unwrap()]);
        let tracer = BoundaryTracer::new(&field);
        let direction = Vector3::new(0.1, 0.0, -1.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), direction);
        let bounds = tracer.trace(&ray, 0.01).unwrap();

        assert_eq!(bounds.len(), 1);
        let seg = bounds.segments()[0];
        assert!((seg.entry.z - 2000.0).abs() <= 0.01);
        assert!((seg.exit.z + 2000.0).abs() <= 0.01);
        // x follows the ray: x = -0.1 z
        assert!((seg.entry.x + 200.0).abs() < 2e-3);
        assert!((seg.exit.x - 200.0).abs() < 2e-3);
        let expected_length = 4000.0 * (1.0f64 + 0.01).sqrt();
        assert!((seg.length() - expected_length).abs() < 0.05);
    }

    #[test]
    fn test_region_touching_world_edge() {
        let edge = |p: &Point3<f64>| {
            if p.x > 39_000.0 {
                Vector3::new(0.0, 0.0, 1.0)
            } else {
                Vector3::zeros()
            }
        };
        let tracer = BoundaryTracer::new(&edge);
        let bounds = tracer.trace(&Ray::along(Axis::X, 1.0, Point3::origin()), 0.01).unwrap();

        assert_eq!(bounds.len(), 1);
        let seg = bounds.segments()[0];
        assert!((seg.entry.x - 39_000.0).abs() <= 0.01);
        assert!(seg.exit.x <= DEFAULT_WORLD_HALF_EXTENT);
        assert_eq!(bounds.exit_position(), seg.exit);
    }

    #[test]
    fn test_ascending_ray_is_reported_not_fatal() {
        let tracer = BoundaryTracer::new(&slab);
        let ray = Ray::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.05));
        let bounds = tracer.trace(&ray, 0.01).unwrap();

        assert_eq!(bounds.len(), 1);
        assert!(matches!(
            bounds.diagnostics(),
            [TraceDiagnostic::AscendingRay { axis: Axis::Z, .. }]
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let tracer = BoundaryTracer::new(&slab);
        let ray = Ray::along(Axis::X, 1.0, Point3::origin());
        assert!(tracer.trace(&ray, 0.0).is_err());
        assert!(tracer.trace(&Ray::new(Point3::origin(), Vector3::zeros()), 0.01).is_err());

        let settings = TracerSettings {
            start_offset: 50_000.0,
            ..TracerSettings::default()
        };
        let tracer = BoundaryTracer::with_settings(&slab, settings);
        assert!(tracer.trace(&ray, 0.01).is_err());
    }

    /// 1 T along y for x in [30000, 30100]
    fn far_slab(p: &Point3<f64>) -> Vector3<f64> {
        if p.x >= 30_000.0 && p.x <= 30_100.0 {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::zeros()
        }
    }

    #[test]
    fn test_segment_endpoints_lie_in_field() {
        let tracer = BoundaryTracer::new(&slab);
        let bounds = tracer.trace(&Ray::along(Axis::X, 1.0, Point3::origin()), 0.5).unwrap();

        let seg = bounds.segments()[0];
        assert_ne!(slab(&seg.entry), Vector3::zeros());
        assert_ne!(slab(&seg.exit), Vector3::zeros());
        assert!(seg.exit.x <= 200.0 && seg.exit.x >= 199.5);
    }

    #[test]
    fn test_unresolvable_steps_rejected() {
        let settings = TracerSettings {
            coarse_step: 1e-13,
            ..TracerSettings::default()
        };
        assert!(settings.validate().is_err());

        let tracer = BoundaryTracer::new(&far_slab);
        let ray = Ray::along(Axis::X, 1.0, Point3::origin());
        assert!(tracer.trace(&ray, 1e-13).is_err());
        assert!(tracer.trace(&ray, min_resolvable_step(DEFAULT_WORLD_HALF_EXTENT)).is_ok());
    }

    #[test]
    fn test_stalled_coarse_step_terminates() {
        let settings = TracerSettings {
            coarse_step: 1e-13,
            ..TracerSettings::default()
        };
        let tracer = BoundaryTracer::with_settings(&far_slab, settings);
        let line = TraceLine::new(&Ray::along(Axis::X, 1.0, Point3::origin()));
        assert!(matches!(tracer.probe(&line, 29_000.0, 0.01, false), Probe::LeftWorld(u) if u == 29_000.0));
    }

    #[test]
    fn test_bisection_stops_at_float_resolution() {
        let tracer = BoundaryTracer::new(&far_slab);
        let line = TraceLine::new(&Ray::along(Axis::X, 1.0, Point3::origin()));
        match tracer.probe(&line, 29_000.0, 1e-15, false) {
            Probe::Boundary { last, first } => {
                assert!(last < 30_000.0);
                assert!(first >= 30_000.0);
                assert!(first - last < 1e-10);
            }
            Probe::LeftWorld(u) => panic!("left the world at {}", u),
        }
    }
}
