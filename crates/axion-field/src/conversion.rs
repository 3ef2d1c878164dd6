//! Axion-photon conversion probability
//!
//! Two formulas are provided:
//!
//! - [`ConversionEngine::averaged_probability`]: closed form for a
//!   homogeneous field over the coherence length, including phase mismatch
//!   and photon absorption in the medium.
//! - [`ConversionEngine::profile_probability`]: numerical integral of the
//!   phase- and absorption-weighted field profile, for non-uniform fields.
//!
//! For a uniform profile both give the same result. Probabilities are for the
//! reference coupling in [`crate::constants`].

use std::sync::Arc;

use nalgebra::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{bl_half_squared, coupling_factor, METER_IN_INVERSE_EV};
use crate::error::{ensure_finite, ensure_non_negative, ensure_positive, AxionError, AxionResult};
use crate::medium::{Medium, Vacuum};
use crate::profile::FieldProfile;

/// Inputs of the homogeneous-field formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionParameters {
    /// Axion energy (keV)
    pub energy: f64,
    /// Axion mass (eV)
    pub axion_mass: f64,
    /// Transverse field magnitude (T)
    pub field: f64,
    /// Coherence length (mm)
    pub coherence_length: f64,
}

impl ConversionParameters {
    pub fn validate(&self) -> AxionResult<()> {
        ensure_positive("energy", self.energy)?;
        ensure_non_negative("axion_mass", self.axion_mass)?;
        ensure_finite("field", self.field)?;
        ensure_non_negative("coherence_length", self.coherence_length)?;
        Ok(())
    }
}

/// Phase mismatch and absorption accumulated over one coherence length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillation {
    /// q = (ma^2 - mgamma^2) / 2Ea, in eV
    pub q: f64,
    /// q * L, dimensionless
    pub phi: f64,
    /// Gamma * L, dimensionless
    pub gamma_l: f64,
}

/// Evaluates conversion probabilities in vacuum or in a medium.
#[derive(Clone)]
pub struct ConversionEngine {
    medium: Arc<dyn Medium>,
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::vacuum()
    }
}

impl std::fmt::Debug for ConversionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionEngine")
            .field("medium", &self.medium.name())
            .finish()
    }
}

impl ConversionEngine {
    pub fn vacuum() -> Self {
        Self {
            medium: Arc::new(Vacuum),
        }
    }

    pub fn with_medium(medium: Arc<dyn Medium>) -> Self {
        Self { medium }
    }

    pub fn medium(&self) -> &dyn Medium {
        self.medium.as_ref()
    }

    fn photon_mass(&self, energy: f64) -> AxionResult<f64> {
        let m = self.medium.photon_mass(energy);
        ensure_non_negative("photon_mass", m)?;
        Ok(m)
    }

    fn absorption(&self, energy: f64) -> AxionResult<f64> {
        let gamma = self.medium.absorption_coefficient(energy);
        ensure_non_negative("absorption_coefficient", gamma)?;
        Ok(gamma)
    }

    /// Phase mismatch and absorption for energy (keV), axion mass (eV) and
    /// coherence length (mm).
    pub fn oscillation(&self, energy: f64, axion_mass: f64, coherence_length: f64) -> AxionResult<Oscillation> {
        let photon_mass = self.photon_mass(energy)?;
        let gamma = self.absorption(energy)?;
        let meters = coherence_length / 1000.0;

        let q = (axion_mass * axion_mass - photon_mass * photon_mass) / 2.0 / (energy * 1000.0);
        let phi = q * meters * METER_IN_INVERSE_EV;
        // Gamma is per cm
        let gamma_l = gamma * meters * 100.0;

        debug!(
            photon_mass,
            axion_mass,
            energy,
            coherence_length,
            q,
            phi,
            gamma,
            gamma_l,
            "conversion parameters"
        );

        Ok(Oscillation { q, phi, gamma_l })
    }

    /// Homogeneous-field probability.
    ///
    /// Evaluates
    /// `(BL/2)^2 * (1 + e^-GL - 2 e^-GL/2 cos phi) / (phi^2 + GL^2/4)`
    /// with the bracket rewritten as `(1 - e^-GL/2)^2 + 4 e^-GL/2 sin^2(phi/2)`,
    /// which stays accurate in double precision as phi and GL go to zero.
    pub fn averaged_probability(&self, params: &ConversionParameters) -> AxionResult<f64> {
        params.validate()?;
        let bl2 = bl_half_squared(params.field, params.coherence_length);

        let photon_mass = self.photon_mass(params.energy)?;
        if params.axion_mass == 0.0 && photon_mass == 0.0 {
            return clamp_probability(bl2);
        }

        let osc = self.oscillation(params.energy, params.axion_mass, params.coherence_length)?;
        let half = osc.gamma_l / 2.0;
        let denominator = osc.phi * osc.phi + half * half;
        if denominator < f64::MIN_POSITIVE {
            return clamp_probability(bl2);
        }

        let decay = (-half).exp_m1();
        let numerator = decay * decay + 4.0 * (-half).exp() * (osc.phi / 2.0).sin().powi(2);

        let p = bl2 * numerator / denominator;
        debug!(bl_half_squared = bl2, probability = p, "averaged-field probability");
        clamp_probability(p)
    }

    /// Arbitrary-profile probability.
    ///
    /// Integrates `B(t) e^{GL/2 (t-1)} e^{-i phi t}` over the segment with the
    /// trapezoidal rule and returns `factor * |integral|^2`.
    pub fn profile_probability(&self, energy: f64, axion_mass: f64, profile: &FieldProfile) -> AxionResult<f64> {
        ensure_positive("energy", energy)?;
        ensure_non_negative("axion_mass", axion_mass)?;

        let osc = self.oscillation(energy, axion_mass, profile.length())?;
        let last = (profile.len() - 1) as f64;
        let spacing = profile.length() / 1000.0 / last;

        let samples = profile.samples();
        let mut amplitude = Complex::new(0.0, 0.0);
        for (i, &b) in samples.iter().enumerate() {
            let t = i as f64 / last;
            let weight = if i == 0 || i == samples.len() - 1 { 0.5 } else { 1.0 };
            let magnitude = b * ((osc.gamma_l / 2.0) * (t - 1.0)).exp();
            amplitude += Complex::from_polar(magnitude, -osc.phi * t) * weight;
        }
        amplitude *= spacing;

        let p = coupling_factor() * amplitude.norm_sqr();
        debug!(
            integral_re = amplitude.re,
            integral_im = amplitude.im,
            probability = p,
            "profile probability"
        );
        clamp_probability(p)
    }

    /// Photon survival over `length` mm of medium outside the field region.
    pub fn transmission(&self, energy: f64, length: f64) -> AxionResult<f64> {
        ensure_positive("energy", energy)?;
        ensure_non_negative("length", length)?;
        if length == 0.0 {
            return Ok(1.0);
        }
        let gamma = self.absorption(energy)?;
        debug!(medium = self.medium.name(), gamma, length, "medium transmission");
        Ok(self.medium.transmission(energy, length))
    }
}

/// Segments are independent conversion opportunities: probabilities add.
pub fn total_probability<I>(probabilities: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    probabilities.into_iter().sum()
}

/// Clamp round-off excursions into [0, 1]; NaN and infinities are errors.
pub fn clamp_probability(p: f64) -> AxionResult<f64> {
    if !p.is_finite() {
        return Err(AxionError::NonFinite {
            quantity: "probability",
            value: p,
        });
    }
    if !(0.0..=1.0).contains(&p) {
        warn!(probability = p, "probability outside [0, 1], clamping");
        return Ok(p.clamp(0.0, 1.0));
    }
    Ok(p)
}
