//! Circuit graph representation and validation.
//!
//! This module provides the editable topology the solver reads each frame.
//! The [`Circuit`] struct holds nodes, an ordered list of branches and the
//! listeners that must hear about branches coming and going.

mod graph;
mod types;
mod validate;

pub use graph::{Branch, BranchListener, Circuit, DEFAULT_BRANCH_LENGTH};
pub use types::*;
pub use validate::{isolated_nodes, validate_circuit, validate_component, validate_length};
