//! Error types for field tracing and conversion

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AxionError {
    #[error("Invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Ray direction {0:?} has no usable travel component")]
    DegenerateDirection([f64; 3]),

    #[error("Non-finite {quantity}: {value}")]
    NonFinite { quantity: &'static str, value: f64 },

    #[error("Field profile needs at least 2 samples, got {0}")]
    ProfileTooShort(usize),

    #[error("Invalid field grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid absorption table: {0}")]
    InvalidAbsorptionTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AxionResult<T> = Result<T, AxionError>;

/// Reject NaN and infinities.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> AxionResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AxionError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> AxionResult<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(AxionError::InvalidParameter {
            name,
            value,
            reason: "must be positive",
        })
    }
}

pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> AxionResult<()> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(AxionError::InvalidParameter {
            name,
            value,
            reason: "must not be negative",
        })
    }
}
