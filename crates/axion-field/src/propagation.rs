//! Per-event field propagation: trace, profile, convert

use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::boundary::{BoundaryTracer, TraceDiagnostic};
use crate::conversion::{clamp_probability, total_probability, ConversionEngine, ConversionParameters};
use crate::error::{ensure_non_negative, ensure_positive, AxionError, AxionResult};
use crate::field::FieldSampler;
use crate::geometry::{Ray, Segment};
use crate::medium::Medium;
use crate::profile::FieldProfileSampler;
use crate::{ProbabilityFormula, PropagationConfig};

/// An incoming axion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxionEvent {
    #[serde(default)]
    pub id: u64,
    /// mm
    pub position: Point3<f64>,
    pub direction: Vector3<f64>,
    /// keV
    pub energy: f64,
    /// eV
    #[serde(default)]
    pub mass: f64,
}

impl AxionEvent {
    pub fn ray(&self) -> Ray {
        Ray::new(self.position, self.direction)
    }

    pub fn validate(&self) -> AxionResult<()> {
        ensure_positive("energy", self.energy)?;
        ensure_non_negative("mass", self.mass)?;
        self.ray().validate()
    }
}

/// Observables produced for every event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observables {
    /// T
    pub field_average: f64,
    pub probability: f64,
    /// mm
    pub coherence_length: f64,
    /// Photon survival through the additional buffer gas length
    pub transmission: f64,
}

impl Default for Observables {
    fn default() -> Self {
        Self {
            field_average: 0.0,
            probability: 0.0,
            coherence_length: 0.0,
            transmission: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PropagationStatus {
    Crossed {
        #[serde(rename = "segment_count")]
        segments: usize,
    },
    /// The track never entered a field region
    NoFieldCrossed,
}

/// Conversion result for one field segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentConversion {
    pub segment: Segment,
    /// mm
    pub length: f64,
    /// T
    pub field_average: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationOutcome {
    pub event_id: u64,
    #[serde(flatten)]
    pub status: PropagationStatus,
    pub observables: Observables,
    pub segments: Vec<SegmentConversion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<TraceDiagnostic>,
}

/// Propagates axions through a magnet and evaluates their photon
/// conversion probability.
pub struct FieldPropagation {
    field: Arc<dyn FieldSampler>,
    engine: ConversionEngine,
    config: PropagationConfig,
}

#[derive(Default)]
pub struct FieldPropagationBuilder {
    field: Option<Arc<dyn FieldSampler>>,
    medium: Option<Arc<dyn Medium>>,
    config: PropagationConfig,
}

impl FieldPropagationBuilder {
    pub fn field(mut self, field: Arc<dyn FieldSampler>) -> Self {
        self.field = Some(field);
        self
    }

    pub fn medium(mut self, medium: Arc<dyn Medium>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn config(mut self, config: PropagationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AxionResult<FieldPropagation> {
        let field = self.field.ok_or(AxionError::MissingCollaborator("magnetic field"))?;
        let mut config = self.config;
        config.validate()?;

        let engine = match self.medium {
            Some(medium) => ConversionEngine::with_medium(medium),
            None => {
                if config.buffer_gas_additional_length > 0.0 {
                    warn!(
                        length = config.buffer_gas_additional_length,
                        "additional buffer gas length ignored without a buffer gas"
                    );
                    config.buffer_gas_additional_length = 0.0;
                }
                ConversionEngine::vacuum()
            }
        };

        Ok(FieldPropagation { field, engine, config })
    }
}

impl FieldPropagation {
    pub fn builder() -> FieldPropagationBuilder {
        FieldPropagationBuilder::default()
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    /// Trace one event through the field and compute its observables.
    pub fn process(&self, event: &AxionEvent) -> AxionResult<PropagationOutcome> {
        event.validate()?;
        debug!(id = event.id, energy = event.energy, mass = event.mass, "processing event");

        let ray = event.ray();
        let tracer = BoundaryTracer::with_settings(self.field.as_ref(), self.config.tracer);
        let bounds = tracer.trace(&ray, self.config.min_step)?;
        let diagnostics = bounds.diagnostics().to_vec();

        if bounds.is_empty() {
            warn!(id = event.id, "track does not cross the field volume");
            return Ok(PropagationOutcome {
                event_id: event.id,
                status: PropagationStatus::NoFieldCrossed,
                observables: Observables::default(),
                segments: Vec::new(),
                diagnostics,
            });
        }

        let sampler = FieldProfileSampler::new(self.field.as_ref());
        let mut segments = Vec::with_capacity(bounds.len());
        for segment in &bounds {
            let profile = sampler.sample_segment(segment, &ray.direction, self.config.profile_resolution)?;
            let field_average = profile.average();
            let probability = match self.config.formula {
                ProbabilityFormula::Profile => self.engine.profile_probability(event.energy, event.mass, &profile)?,
                ProbabilityFormula::Averaged => self.engine.averaged_probability(&ConversionParameters {
                    energy: event.energy,
                    axion_mass: event.mass,
                    field: field_average,
                    coherence_length: profile.length(),
                })?,
            };
            debug!(
                entry = ?segment.entry,
                exit = ?segment.exit,
                length = profile.length(),
                field_average,
                probability,
                "segment converted"
            );
            segments.push(SegmentConversion {
                segment: *segment,
                length: profile.length(),
                field_average,
                probability,
            });
        }

        let coherence_length: f64 = segments.iter().map(|s| s.length).sum();
        let field_average = if coherence_length > 0.0 {
            segments.iter().map(|s| s.field_average * s.length).sum::<f64>() / coherence_length
        } else {
            segments.iter().map(|s| s.field_average).sum::<f64>() / segments.len() as f64
        };
        let probability = clamp_probability(total_probability(segments.iter().map(|s| s.probability)))?;
        let transmission = self
            .engine
            .transmission(event.energy, self.config.buffer_gas_additional_length)?;

        debug!(
            field_average,
            probability,
            coherence_length,
            transmission,
            "event observables"
        );

        Ok(PropagationOutcome {
            event_id: event.id,
            status: PropagationStatus::Crossed {
                segments: segments.len(),
            },
            observables: Observables {
                field_average,
                probability,
                coherence_length,
                transmission,
            },
            segments,
            diagnostics,
        })
    }

    /// Evaluate independent events; a failing event does not stop the others.
    pub fn process_batch(&self, events: &[AxionEvent]) -> Vec<AxionResult<PropagationOutcome>> {
        events.iter().map(|event| self.process(event)).collect()
    }
}
