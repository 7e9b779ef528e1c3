use thiserror::Error;

/// ConfigError is returned if a simulation parameter does not fulfill the posed requirements,
/// e.g. a course that collapses to a single point or a non-positive speed multiplier.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("course needs at least 3 distinct control points, got {0}")]
    TooFewControlPoints(usize),

    #[error("course control point {idx} is not finite")]
    NonFiniteControlPoint { idx: usize },

    #[error("course has zero length")]
    ZeroLengthCourse,

    #[error("invalid value {value} for parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("race field is empty")]
    EmptyField,

    #[error("could not parse color `{0}`")]
    InvalidColor(String),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        ConfigError::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// check_positive returns an error if value is not a finite number greater than zero.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, value, "must be finite and > 0"))
    }
}

/// check_unit_interval returns an error if value is not in [0.0, 1.0).
pub(crate) fn check_unit_interval(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, value, "must be in [0.0, 1.0)"))
    }
}
