//! Charge-carrier propagation.
//!
//! Carriers are point particles that visualize current. Each one sits on a
//! branch at a distance from the branch's start node. Once per frame the
//! [`ConstantDensityPropagator`] moves them by the frame's time-averaged
//! branch current, hands them across junctions, and re-lays out branches
//! whose carrier count has drifted too far from `length * density`.

mod electron_set;
mod propagator;

pub use electron_set::{Electron, ElectronSet};
pub use propagator::{
    CarrierMode, ConstantDensityPropagator, DEFAULT_DENSITY_TOLERANCE, DEFAULT_MAX_STEP_FRACTION,
    DEFAULT_SPEED_SCALE,
};

/// Default carriers per unit branch length.
pub const DEFAULT_CARRIER_DENSITY: f64 = 10.0;
