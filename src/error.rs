//! Error types for the mnasim circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! netlist parsing, topology misuse, parameter validation and the numerical
//! failures of a simulation step.
//!
//! Numerical failures are normally reported through
//! [`StepOutcome`](crate::solver::StepOutcome) rather than as errors; the
//! numerical variants here exist for callers that convert a report with
//! [`StepReport::into_result`](crate::solver::StepReport::into_result).

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all mnasim operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid element definition
    #[error("Invalid component '{name}' at line {line}: {message}")]
    InvalidComponent {
        name: String,
        line: usize,
        message: String,
    },

    /// Unknown element type
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by component '{component}'")]
    UndefinedModel { model: String, component: String },

    /// Duplicate model name
    #[error("Duplicate model name '{name}'")]
    DuplicateModel { name: String },

    /// Duplicate element name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    // ============ Topology Errors ============
    /// A pin references a node outside the netlist
    #[error("Node {net} is out of range for a netlist of {node_count} nodes")]
    NodeOutOfRange { net: usize, node_count: usize },

    /// The netlist was already finalized
    #[error("Netlist is already finalized; devices and topology are frozen")]
    AlreadyFinalized,

    /// The netlist must be finalized first
    #[error("Netlist has not been finalized")]
    NotFinalized,

    /// Invalid device parameter value
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    /// Invalid time step size
    #[error("Invalid time step {step:e}: must be positive and finite")]
    InvalidTimeStep { step: f64 },

    /// Node not connected to ground through any device
    #[error("Floating node '{node}' detected - not connected to ground")]
    FloatingNode { node: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    /// Working matrix does not match the system size
    #[error("Dimension mismatch: expected {expected}x{expected}, found {found}x{found}")]
    DimensionMismatch { expected: usize, found: usize },

    // ============ Simulation Errors ============
    /// Zero pivot found during factorization
    #[error("Singular matrix at net {net} - circuit may have a floating node or a source loop")]
    SingularMatrix { net: usize },

    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge in {iterations} iterations (residual {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Non-finite value in the solution vector
    #[error("Non-finite value at net {net}")]
    NumericalOverflow { net: usize },

    // ============ I/O Errors ============
    /// Error reading a netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing simulation output
    #[error("Failed to write output: {source}")]
    OutputError {
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(
        name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        component: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component: component.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// Whether this error is a numerical condition a caller may retry,
    /// e.g. with a smaller time step.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::SingularMatrix { .. }
                | Self::ConvergenceFailure { .. }
                | Self::NumericalOverflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numerical_classification() {
        assert!(SimError::SingularMatrix { net: 3 }.is_numerical());
        assert!(SimError::convergence_failure(200, 1e-3).is_numerical());
        assert!(!SimError::NotFinalized.is_numerical());
        assert!(!SimError::NodeOutOfRange { net: 9, node_count: 4 }.is_numerical());
    }

    #[test]
    fn test_messages() {
        let err = SimError::invalid_parameter("R1", "resistance", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'resistance' for component 'R1': must be positive"
        );
        let err = SimError::convergence_failure(200, 1.5e-3);
        assert!(err.to_string().contains("200 iterations"));
    }
}
