//! Photon propagation media (vacuum, buffer gas)

use crate::error::{ensure_non_negative, ensure_positive, AxionError, AxionResult};

/// Plasma-frequency photon mass per sqrt(Z/A * g/cm3), in eV
pub const PHOTON_MASS_PER_SQRT_DENSITY: f64 = 28.77;

/// Energy-dependent photon properties of the medium filling the magnet.
pub trait Medium: Send + Sync {
    /// Human-readable name of this medium.
    fn name(&self) -> &str;

    /// Effective photon mass (eV) at axion energy `energy` (keV).
    fn photon_mass(&self, energy: f64) -> f64;

    /// Photon absorption coefficient (cm^-1) at `energy` (keV).
    fn absorption_coefficient(&self, energy: f64) -> f64;

    /// Fraction of photons surviving `length` mm of this medium.
    fn transmission(&self, energy: f64, length: f64) -> f64 {
        (-self.absorption_coefficient(energy) * length / 10.0).exp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vacuum;

impl Medium for Vacuum {
    fn name(&self) -> &str {
        "vacuum"
    }

    fn photon_mass(&self, _energy: f64) -> f64 {
        0.0
    }

    fn absorption_coefficient(&self, _energy: f64) -> f64 {
        0.0
    }
}

/// Absorption coefficients tabulated against energy, interpolated log-log.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsorptionTable {
    log_energy: Vec<f64>,
    log_coefficient: Vec<f64>,
}

impl AbsorptionTable {
    /// `points` are (energy keV, coefficient cm^-1) pairs with strictly
    /// increasing energy and positive values.
    pub fn new(points: &[(f64, f64)]) -> AxionResult<Self> {
        if points.is_empty() {
            return Err(AxionError::InvalidAbsorptionTable("table is empty".to_string()));
        }
        if points.iter().any(|&(e, mu)| !(e > 0.0 && mu > 0.0 && e.is_finite() && mu.is_finite())) {
            return Err(AxionError::InvalidAbsorptionTable(
                "energies and coefficients must be positive and finite".to_string(),
            ));
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(AxionError::InvalidAbsorptionTable(
                "energies must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            log_energy: points.iter().map(|p| p.0.ln()).collect(),
            log_coefficient: points.iter().map(|p| p.1.ln()).collect(),
        })
    }

    /// Coefficient at `energy`; held constant beyond the table ends.
    pub fn coefficient(&self, energy: f64) -> f64 {
        let n = self.log_energy.len();
        let x = energy.ln();
        if n == 1 || x <= self.log_energy[0] {
            return self.log_coefficient[0].exp();
        }
        if x >= self.log_energy[n - 1] {
            return self.log_coefficient[n - 1].exp();
        }
        let upper = self.log_energy.partition_point(|&e| e < x);
        let lower = upper - 1;
        let t = (x - self.log_energy[lower]) / (self.log_energy[upper] - self.log_energy[lower]);
        (self.log_coefficient[lower] + t * (self.log_coefficient[upper] - self.log_coefficient[lower])).exp()
    }
}

/// Buffer gas filling the magnet bore
#[derive(Debug, Clone)]
pub struct BufferGas {
    name: String,
    /// g/cm3
    density: f64,
    z_over_a: f64,
    absorption: AbsorptionTable,
}

impl BufferGas {
    pub fn new(name: impl Into<String>, density: f64, z_over_a: f64, absorption: AbsorptionTable) -> AxionResult<Self> {
        ensure_non_negative("gas_density", density)?;
        ensure_positive("z_over_a", z_over_a)?;
        Ok(Self {
            name: name.into(),
            density,
            z_over_a,
            absorption,
        })
    }

    pub fn helium(density: f64, absorption: AbsorptionTable) -> AxionResult<Self> {
        Self::new("He", density, 2.0 / 4.002602, absorption)
    }

    pub fn density(&self) -> f64 {
        self.density
    }
}

impl Medium for BufferGas {
    fn name(&self) -> &str {
        &self.name
    }

    fn photon_mass(&self, _energy: f64) -> f64 {
        PHOTON_MASS_PER_SQRT_DENSITY * (self.z_over_a * self.density).sqrt()
    }

    fn absorption_coefficient(&self, energy: f64) -> f64 {
        self.absorption.coefficient(energy)
    }
}
