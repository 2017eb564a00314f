//! Error module for the spike sampling library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// Error for a declared dependency name with no matching node. Fatal at registry binding time.
    Binding(String),
    /// Error for accessing a node name that was never declared.
    UnknownNode(String),
    /// Error for a recomputation cycle detected while computing a node.
    DependencyCycle(String),
    /// Error for a weight matrix or bias vector whose shape does not match the sampler count.
    ShapeMismatch(String),
    /// Error for reading a derived value before any source value has been written.
    NoSourceValue(String),
    /// Error for a unit conversion requested from a sampler without a loaded calibration.
    NotCalibrated(usize),
    /// Error for invalid parameters.
    InvalidParameter(String),
    /// Error for invalid operation, e.g., explicitly setting a derived-only node.
    InvalidOperation(String),
    /// Error from an external collaborator, e.g., a failed simulator subprocess.
    Upstream(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SamplingError::Binding(e) => write!(f, "Dependency binding error: {}", e),
            SamplingError::UnknownNode(e) => write!(f, "Unknown node: {}", e),
            SamplingError::DependencyCycle(e) => write!(f, "Dependency cycle: {}", e),
            SamplingError::ShapeMismatch(e) => write!(f, "Shape mismatch: {}", e),
            SamplingError::NoSourceValue(e) => {
                write!(f, "No source value to derive {} from", e)
            }
            SamplingError::NotCalibrated(id) => {
                write!(f, "Sampler {} has no calibration loaded", id)
            }
            SamplingError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SamplingError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            SamplingError::Upstream(e) => write!(f, "Upstream failure: {}", e),
            SamplingError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SamplingError {}
