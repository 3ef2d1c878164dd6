//! Physical constants and natural-unit conversions
//!
//! Conversion probabilities are quoted for a reference axion-photon coupling
//! of 1e-10 GeV^-1. Lengths come in as mm, fields as T.

/// Speed of light (m/s)
pub const LIGHT_SPEED: f64 = 2.997_924_58e8;

/// Electron charge in natural units, sqrt(4 pi alpha)
pub const NATURAL_ELECTRON_CHARGE: f64 = 0.302_822_12;

/// One metre expressed in eV^-1, i.e. 1 / (hbar c)
pub const METER_IN_INVERSE_EV: f64 = 5.067_730_717_679_395e6;

/// Reference coupling g_agamma in GeV^-1
pub const REFERENCE_COUPLING: f64 = 1.0e-10;

/// One T*m expressed in GeV
pub fn tesla_meter_in_gev() -> f64 {
    LIGHT_SPEED / NATURAL_ELECTRON_CHARGE * 1.0e-9
}

/// g * B * L in natural units for field `b` (T) over `length` (mm).
pub fn bl(b: f64, length: f64) -> f64 {
    let meters = length / 1000.0;
    meters * b * tesla_meter_in_gev() * REFERENCE_COUPLING
}

/// (g B L / 2)^2, the massless-vacuum conversion probability.
pub fn bl_half_squared(b: f64, length: f64) -> f64 {
    let half = bl(b, length) / 2.0;
    half * half
}

/// (g / 2)^2 expressed per (T*m)^2; multiplies |integral of B dl|^2.
pub fn coupling_factor() -> f64 {
    let half = tesla_meter_in_gev() * REFERENCE_COUPLING / 2.0;
    half * half
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesla_meter() {
        assert!((tesla_meter_in_gev() - 0.989_995_242).abs() < 1e-9);
    }

    #[test]
    fn test_bl_half_squared_reference() {
        // 2 T over a 4 m bore
        let p = bl_half_squared(2.0, 4000.0);
        assert!((p / 1.568_144_926_981_451_8e-19 - 1.0).abs() < 1e-12, "P = {:e}", p);
    }

    #[test]
    fn test_coupling_factor_matches_bl() {
        let b = 9.0;
        let meters = 9.26;
        let via_factor = coupling_factor() * (b * meters) * (b * meters);
        let direct = bl_half_squared(b, meters * 1000.0);
        assert!((via_factor / direct - 1.0).abs() < 1e-12);
    }
}
