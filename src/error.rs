//! Error module for the Rusty Stim library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum StimError {
    /// Error for a per-target parameter array whose length disagrees with the
    /// weight array and is not a valid scalar broadcast.
    ShapeMismatch {
        parameter: &'static str,
        len: usize,
        num_weights: usize,
    },
    /// Error for shared-generator (calibration) topologies whose weights all
    /// carry the same sign.
    DegenerateConfiguration(String),
    /// Error for a requested generator model that the backend does not
    /// provide, with no usable fallback.
    UnsupportedBackendModel(String),
    /// Internal consistency error: a wiring row disagrees with the canonical
    /// weight-sign rule.
    SignPolicyViolation(String),
    /// Error for invalid configuration parameters.
    InvalidParameter(String),
    /// Error reported by the backend adapter during entity creation or wiring.
    Backend(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for StimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StimError::ShapeMismatch {
                parameter,
                len,
                num_weights,
            } => write!(
                f,
                "{}-parameter needs to be either scalar or same length as weights-array (got {} for {} weights)",
                parameter, len, num_weights
            ),
            StimError::DegenerateConfiguration(e) => {
                write!(f, "Degenerate source configuration: {}", e)
            }
            StimError::UnsupportedBackendModel(e) => {
                write!(f, "Unsupported backend model: {}", e)
            }
            StimError::SignPolicyViolation(e) => {
                write!(f, "Receptor sign policy violation: {}", e)
            }
            StimError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            StimError::Backend(e) => write!(f, "Backend error: {}", e),
            StimError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for StimError {}
