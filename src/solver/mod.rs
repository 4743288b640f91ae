//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and battery branch currents
//! - A is the coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   0 ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (KCL rows)
//! - B, C connect batteries to their terminal nodes
//! - v is the vector of node voltages
//! - j is the vector of battery currents
//! - i is the sum of current sources at each node
//! - e is the vector of battery voltages
//!
//! ## Per-frame pipeline
//!
//! ```text
//! Circuit -> companion models -> MnaCircuit (equations) -> MnaCircuitSolver
//!         -> MnaSolution -> DynamicSolution -> carriers
//! ```
//!
//! Every short-lived object on this path (terms, equations, solutions,
//! carriers) lives in a [`Pool`] and is tagged with an [`OwnerId`]. The
//! assembler's working buffers (union-find parents, islands, KCL rows) sit in
//! an [`MnaScratch`] the stepper hands back and forth, so once a topology has
//! been solved a few times its frames stop allocating.

mod companion;
mod dynamic;
mod equation;
mod linear;
mod mna;
mod pool;
mod simulator;
mod solution;

pub use companion::{build_companions, companion_models, CompanionKind, CompanionModel};
pub use dynamic::{DynamicSolution, DynamicStepper};
pub use equation::{Equation, EquationKind, MnaArena, Term, Unknown};
pub use linear::{DenseSystem, MnaCircuitSolver};
pub use mna::{Island, MnaCircuit, MnaScratch};
pub use pool::{Handle, OwnerAllocator, OwnerId, Pool, Recycle};
pub use simulator::{FrameReport, Simulator, SimulatorConfig};
pub use solution::{BranchReading, MnaSolution};

/// Resistances below this are solved as zero-volt batteries.
pub const MIN_RESISTANCE: f64 = 1e-9;

/// Default upper bound on a single sub-step (seconds).
pub const DEFAULT_MAX_SUBSTEP: f64 = 1e-3;

/// Default cap on sub-steps per frame.
pub const DEFAULT_MAX_SUBSTEPS: usize = 100;

/// Default pivot magnitude below which a system is reported singular.
pub const DEFAULT_SINGULAR_EPSILON: f64 = 1e-12;
