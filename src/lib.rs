//! # Voltaic Core
//!
//! A frame-stepped circuit solver for circuit-construction simulations.
//!
//! This library provides:
//! - A small netlist language for describing circuit topologies
//! - Modified Nodal Analysis (MNA) with backward-Euler companion models for
//!   capacitors and inductors
//! - Per-frame sub-stepping with instantaneous and time-averaged readings
//! - Charge-carrier propagation that visualizes current at a constant density
//! - Owner-scoped object pools so steady-state frames do not allocate
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`circuit`] - Editable topology, branch listeners and validation
//! - [`components`] - Branch element models (batteries, resistors, capacitors, ...)
//! - [`solver`] - Pools, companion models, assembly, linear solve and stepping
//! - [`electrons`] - Carrier set and constant-density propagation
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! RUST_LOG=debug voltaic flashlight.net --frames 120 --fps 60 --average
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use voltaic_core::{Simulator, SimulatorConfig};
//!
//! let mut sim = Simulator::from_netlist("B1 0 a 12\nR1 a 0 4\n", SimulatorConfig::default())?;
//! sim.step(1.0 / 60.0)?;
//! assert!((sim.branch_current("R1").unwrap() - 3.0).abs() < 1e-9);
//! # Ok::<(), voltaic_core::VoltaicError>(())
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmCircuitSim } from 'voltaic_core';
//!
//! const sim = new WasmCircuitSim(netlist);
//! sim.step(dt);
//! const positions = sim.carrier_positions();
//! ```
//!
//! ## Frame Pipeline
//!
//! Each call to [`Simulator::step`] with elapsed time T:
//!
//! 1. Splits T into sub-steps no longer than `max_substep`
//! 2. Per sub-step, rebuilds companion models, assembles KCL and battery
//!    equations per island, and solves them with dense LU
//! 3. Advances capacitor and inductor state from each solution
//! 4. Moves carriers by the frame's time-averaged branch currents
//!
//! A singular island (conflicting batteries, a shorted source) reads as zero
//! for that sub-step instead of failing the frame.

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod electrons;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::{BranchId, Circuit, NodeId, Probe};
pub use error::{Result, VoltaicError};
pub use solver::{Simulator, SimulatorConfig};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuitSim;
