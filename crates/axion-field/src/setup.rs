//! JSON simulation setup: magnet, optional buffer gas, config and events

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AxionResult;
use crate::field::{FieldGrid, FieldShape, MagnetField, MagnetVolume};
use crate::medium::{AbsorptionTable, BufferGas, Medium};
use crate::propagation::{AxionEvent, FieldPropagation, PropagationOutcome, PropagationStatus};
use crate::PropagationConfig;

/// Complete description of a propagation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSetup {
    pub magnet: MagnetSpec,
    #[serde(default)]
    pub buffer_gas: Option<BufferGasSpec>,
    #[serde(default)]
    pub config: PropagationConfig,
    #[serde(default)]
    pub events: Vec<AxionEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagnetSpec {
    pub volumes: Vec<VolumeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    #[serde(default)]
    pub name: String,
    /// mm
    pub min: Point3<f64>,
    /// mm
    pub max: Point3<f64>,
    pub field: FieldSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpec {
    /// Constant field vector (T)
    Uniform(Vector3<f64>),
    /// Regular grid spanning the volume, values x-fastest
    Grid {
        nodes: [usize; 3],
        values: Vec<Vector3<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferGasSpec {
    #[serde(default = "default_gas_name")]
    pub name: String,
    /// g/cm3
    pub density: f64,
    #[serde(default = "default_z_over_a")]
    pub z_over_a: f64,
    /// (energy keV, absorption cm^-1) pairs
    pub absorption: Vec<(f64, f64)>,
}

fn default_gas_name() -> String {
    "He".to_string()
}

fn default_z_over_a() -> f64 {
    2.0 / 4.002602
}

impl VolumeSpec {
    pub fn build(&self) -> AxionResult<MagnetVolume> {
        let shape = match &self.field {
            FieldSpec::Uniform(b) => FieldShape::Uniform(*b),
            FieldSpec::Grid { nodes, values } => FieldShape::Grid(FieldGrid::new(*nodes, values.clone())?),
        };
        MagnetVolume::new(self.name.clone(), self.min, self.max, shape)
    }
}

impl MagnetSpec {
    pub fn build(&self) -> AxionResult<MagnetField> {
        let volumes = self
            .volumes
            .iter()
            .map(VolumeSpec::build)
            .collect::<AxionResult<Vec<_>>>()?;
        Ok(MagnetField::new(volumes))
    }
}

impl BufferGasSpec {
    pub fn build(&self) -> AxionResult<BufferGas> {
        let table = AbsorptionTable::new(&self.absorption)?;
        BufferGas::new(self.name.clone(), self.density, self.z_over_a, table)
    }
}

/// Per-event entry of a run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    pub event_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PropagationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub events: usize,
    pub crossed: usize,
    pub not_crossed: usize,
    pub failed: usize,
    /// Sum of conversion probabilities over successful events
    pub probability_sum: f64,
    /// Sum of probability times transmission
    pub detected_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: String,
    pub medium: String,
    pub config: PropagationConfig,
    pub events: Vec<EventReport>,
    pub totals: RunTotals,
}

impl SimulationSetup {
    pub fn from_file(path: impl AsRef<Path>) -> AxionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn build_propagation(&self) -> Result<FieldPropagation> {
        let field = self.magnet.build().context("Invalid magnet description")?;
        if field.is_empty() {
            warn!("magnet has no volumes, every event will miss the field");
        }

        let mut builder = FieldPropagation::builder()
            .field(Arc::new(field))
            .config(self.config);
        if let Some(gas) = &self.buffer_gas {
            let gas = gas.build().context("Invalid buffer gas description")?;
            builder = builder.medium(Arc::new(gas));
        }
        Ok(builder.build()?)
    }

    /// Propagate every event and collect the observables.
    pub fn run(&self) -> Result<RunReport> {
        let propagation = self.build_propagation()?;
        let medium = propagation.engine().medium().name().to_string();

        info!(events = self.events.len(), medium = %medium, "running propagation");

        let mut totals = RunTotals {
            events: self.events.len(),
            ..RunTotals::default()
        };
        let events = self
            .events
            .iter()
            .zip(propagation.process_batch(&self.events))
            .map(|(event, result)| match result {
                Ok(outcome) => {
                    match outcome.status {
                        PropagationStatus::Crossed { .. } => totals.crossed += 1,
                        PropagationStatus::NoFieldCrossed => totals.not_crossed += 1,
                    }
                    totals.probability_sum += outcome.observables.probability;
                    totals.detected_sum += outcome.observables.probability * outcome.observables.transmission;
                    EventReport {
                        event_id: event.id,
                        outcome: Some(outcome),
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(id = event.id, error = %err, "event failed");
                    totals.failed += 1;
                    EventReport {
                        event_id: event.id,
                        outcome: None,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect();

        Ok(RunReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            medium,
            config: *propagation.config(),
            events,
            totals,
        })
    }
}

/// Read and run a setup file.
pub fn load_and_run(path: impl AsRef<Path>) -> Result<RunReport> {
    let path = path.as_ref();
    let setup = SimulationSetup::from_file(path).with_context(|| format!("Failed to load setup: {:?}", path))?;
    setup.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP: &str = r#"{
        "magnet": {
            "volumes": [
                {
                    "name": "bore",
                    "min": [-50.0, -50.0, -1000.0],
                    "max": [50.0, 50.0, 1000.0],
                    "field": {"uniform": [0.0, 3.0, 0.0]}
                }
            ]
        },
        "config": {"profile_resolution": {"samples": 2000}},
        "events": [
            {"id": 1, "position": [0.0, 0.0, 0.0], "direction": [0.0, 0.0, -1.0], "energy": 3.0},
            {"id": 2, "position": [500.0, 0.0, 0.0], "direction": [0.0, 0.0, -1.0], "energy": 3.0},
            {"id": 3, "position": [0.0, 0.0, 0.0], "direction": [0.0, 0.0, -1.0], "energy": 0.0}
        ]
    }"#;

    #[test]
    fn test_parse_setup() {
        let setup: SimulationSetup = serde_json::from_str(SETUP).unwrap();
        assert_eq!(setup.magnet.volumes.len(), 1);
        assert!(setup.buffer_gas.is_none());
        assert_eq!(setup.events.len(), 3);
        assert_eq!(setup.events[0].mass, 0.0);
        assert_eq!(setup.config.min_step, 0.01);
    }

    #[test]
    fn test_run_counts_outcomes() {
        let setup: SimulationSetup = serde_json::from_str(SETUP).unwrap();
        let report = setup.run().unwrap();

        assert_eq!(report.medium, "vacuum");
        assert_eq!(report.totals.events, 3);
        assert_eq!(report.totals.crossed, 1);
        assert_eq!(report.totals.not_crossed, 1);
        assert_eq!(report.totals.failed, 1);
        assert!(report.events[2].error.is_some());
        assert!(report.totals.probability_sum > 0.0);
        assert_eq!(report.totals.probability_sum, report.totals.detected_sum);
    }

    #[test]
    fn test_grid_volume() {
        let spec = VolumeSpec {
            name: "grid".to_string(),
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
            field: FieldSpec::Grid {
                nodes: [2, 2, 2],
                values: vec![Vector3::new(1.0, 0.0, 0.0); 8],
            },
        };
        let volume = spec.build().unwrap();
        assert_eq!(volume.field_at(&Point3::new(0.5, 0.5, 0.5)), Some(Vector3::new(1.0, 0.0, 0.0)));

        let bad = VolumeSpec {
            field: FieldSpec::Grid {
                nodes: [2, 2, 2],
                values: vec![Vector3::zeros(); 3],
            },
            ..spec
        };
        assert!(bad.build().is_err());
    }

    #[test]
    fn test_buffer_gas_spec_defaults() {
        let spec: BufferGasSpec = serde_json::from_str(r#"{"density": 1e-4, "absorption": [[1.0, 2.0]]}"#).unwrap();
        assert_eq!(spec.name, "He");
        let gas = spec.build().unwrap();
        assert_eq!(gas.name(), "He");
        assert!(gas.photon_mass(1.0) > 0.0);
    }
}
