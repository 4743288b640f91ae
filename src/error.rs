//! Error types for the Voltaic circuit solver.
//!
//! This module provides a unified error type [`VoltaicError`] that covers
//! netlist parsing, topology editing, pool bookkeeping and simulation.
//!
//! Not every variant reaches the frame caller: [`VoltaicError::SingularSystem`]
//! is raised by the linear solver but the dynamic stepper degrades the affected
//! island to zero and carries on, since interactively built circuits pass
//! through invalid states all the time.

use thiserror::Error;

use crate::solver::OwnerId;

/// Result type alias using [`VoltaicError`].
pub type Result<T> = std::result::Result<T, VoltaicError>;

/// Unified error type for all Voltaic operations.
#[derive(Error, Debug)]
pub enum VoltaicError {
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

    /// Invalid component definition
    #[error("Invalid component '{name}' at line {line}: {message}")]
    InvalidComponent {
        name: String,
        line: usize,
        message: String,
    },

    /// Component keyword with no branch variant behind it
    #[error("Unsupported branch type '{component_type}' at line {line}")]
    UnsupportedBranchType { component_type: String, line: usize },

    // ============ Topology Errors ============
    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for branch '{branch}': {message}")]
    InvalidParameter {
        branch: String,
        param: String,
        message: String,
    },

    /// Node not found in circuit
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Branch not found in circuit
    #[error("Branch '{branch}' not found in circuit")]
    BranchNotFound { branch: String },

    /// Duplicate branch name
    #[error("Duplicate branch name '{name}'")]
    DuplicateBranch { name: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Simulation Errors ============
    /// Island matrix is singular or indeterminate
    #[error("Singular system in an island of {island_size} nodes - conflicting sources or a source loop")]
    SingularSystem { island_size: usize },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Pool Errors ============
    /// An owner was retired while still holding pooled objects
    #[error("Pool imbalance: {owner} retired with {outstanding} live objects")]
    PoolImbalance { owner: OwnerId, outstanding: usize },

    /// A handle whose slot has been recycled since it was issued
    #[error("Stale pool handle (slot {index}, generation {generation})")]
    StaleHandle { index: u32, generation: u32 },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ============ WASM Errors ============
    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    WasmError { message: String },
}

impl VoltaicError {
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
    pub fn invalid_component(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        branch: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            branch: branch.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_simulation_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }
}
