//! axion-field: Trace axions through magnetic field regions and compute
//! their conversion probability into photons
//!
//! This crate provides:
//! - Boundary tracing of non-zero field segments along straight tracks
//! - Sampling of the transverse field profile over each segment
//! - Conversion probabilities for uniform or sampled fields, in vacuum or
//!   in an absorbing buffer gas
//! - A JSON driven batch runner with JSON and text reports
//!
//! Lengths are in mm, fields in T, axion energies in keV and masses in eV.

pub mod boundary;
pub mod constants;
pub mod conversion;
pub mod error;
pub mod field;
pub mod geometry;
pub mod medium;
pub mod profile;
pub mod propagation;
pub mod report;
pub mod setup;

pub use boundary::{BoundaryList, BoundaryTracer, TraceDiagnostic, TracerSettings};
pub use constants::{bl, bl_half_squared};
pub use conversion::{ConversionEngine, ConversionParameters};
pub use error::{AxionError, AxionResult};
pub use field::{FieldGrid, FieldSampler, FieldShape, MagnetField, MagnetVolume};
pub use geometry::{Axis, Ray, Segment};
pub use medium::{AbsorptionTable, BufferGas, Medium, Vacuum};
pub use profile::{FieldProfile, FieldProfileSampler, ProfileResolution};
pub use propagation::{AxionEvent, FieldPropagation, Observables, PropagationOutcome, PropagationStatus};
pub use report::{render_json, render_text};
pub use setup::{RunReport, SimulationSetup};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive};

/// Main entry point: parse a simulation setup and propagate all its events
pub fn run_setup(json: &str) -> Result<RunReport> {
    let setup: SimulationSetup = serde_json::from_str(json).context("Invalid simulation setup")?;
    setup.run()
}

/// Which conversion formula is applied to each segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityFormula {
    /// Integrate the sampled field profile
    #[default]
    Profile,
    /// Uniform field equal to the segment average
    Averaged,
}

/// Configuration for event propagation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Boundary resolution along the dominant axis (mm)
    pub min_step: f64,
    #[serde(flatten)]
    pub tracer: TracerSettings,
    pub profile_resolution: ProfileResolution,
    pub formula: ProbabilityFormula,
    /// Buffer gas traversed after the last field region (mm)
    pub buffer_gas_additional_length: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            min_step: boundary::DEFAULT_MIN_STEP,
            tracer: TracerSettings::default(),
            profile_resolution: ProfileResolution::default(),
            formula: ProbabilityFormula::default(),
            buffer_gas_additional_length: 0.0,
        }
    }
}

impl PropagationConfig {
    pub fn validate(&self) -> AxionResult<()> {
        ensure_positive("min_step", self.min_step)?;
        self.tracer.validate()?;
        // Rejects zero sample counts and non-positive steps
        self.profile_resolution.sample_count(1.0)?;
        ensure_non_negative("buffer_gas_additional_length", self.buffer_gas_additional_length)
    }
}
