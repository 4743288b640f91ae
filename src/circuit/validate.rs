//! Circuit validation.

use crate::components::Component;
use crate::error::{Result, VoltaicError};

use super::{Circuit, NodeId};

fn check(branch: &str, param: &str, value: f64, positive: bool) -> Result<()> {
    if !value.is_finite() {
        return Err(VoltaicError::invalid_parameter(branch, param, "must be finite"));
    }
    if positive && value <= 0.0 {
        return Err(VoltaicError::invalid_parameter(
            branch,
            param,
            format!("must be positive, got {}", value),
        ));
    }
    Ok(())
}

fn check_non_negative(branch: &str, param: &str, value: f64) -> Result<()> {
    check(branch, param, value, false)?;
    if value < 0.0 {
        return Err(VoltaicError::invalid_parameter(
            branch,
            param,
            format!("must not be negative, got {}", value),
        ));
    }
    Ok(())
}

/// Validate the parameters of a single component.
pub fn validate_component(name: &str, component: &Component) -> Result<()> {
    match component {
        Component::Battery(b) => check(name, "voltage", b.voltage, false),
        Component::Resistor(r) => check_non_negative(name, "resistance", r.resistance),
        Component::Capacitor(c) => {
            check(name, "capacitance", c.capacitance, true)?;
            check(name, "v0", c.voltage, false)
        }
        Component::Inductor(l) => {
            check(name, "inductance", l.inductance, true)?;
            check(name, "i0", l.current, false)
        }
        Component::Switch(_) => Ok(()),
        Component::Wire(w) => check_non_negative(name, "resistance", w.resistance),
        Component::CurrentSource(i) => check(name, "current", i.current, false),
    }
}

/// Validate a branch length.
pub fn validate_length(name: &str, length: f64) -> Result<()> {
    check(name, "len", length, true)
}

/// Validate a circuit for simulation.
///
/// Checks:
/// - The circuit has at least one branch
/// - Component parameters are valid
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.branches().is_empty() {
        return Err(VoltaicError::InvalidTopology {
            message: "Circuit has no branches".to_string(),
        });
    }

    for branch in circuit.branches() {
        validate_component(&branch.name, &branch.component)?;
        validate_length(&branch.name, branch.length)?;
    }

    Ok(())
}

/// Nodes that no branch touches. The solver reports these as undefined.
pub fn isolated_nodes(circuit: &Circuit) -> Vec<NodeId> {
    (0..circuit.node_count())
        .map(NodeId)
        .filter(|&n| circuit.branches_at(n).next().is_none())
        .collect()
}
