//! Companion model builder.
//!
//! Converts each branch into the linear primitives that stand in for it during
//! one sub-step of length `dt`:
//!
//! | Branch | Companion |
//! |--------|-----------|
//! | Battery | battery `V` |
//! | Resistor, Wire | resistor `R`, or a 0 V battery when `R < MIN_RESISTANCE` |
//! | Capacitor | resistor `dt/C` parallel to source `-C v_prev / dt` |
//! | Inductor | resistor `L/dt` parallel to source `i_prev` |
//! | Switch | 0 V battery when closed, nothing when open |
//! | CurrentSource | current source `I` |

use crate::circuit::{Branch, BranchId, Circuit, NodeId};
use crate::components::Component;

/// The three primitive element types the assembler understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompanionKind {
    /// Ideal voltage source, `V(end) - V(start) = voltage`
    Battery(f64),
    /// Ideal resistor
    Resistor(f64),
    /// Ideal current source, positive from start to end
    CurrentSource(f64),
}

/// A primitive element valid for a single sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanionModel {
    /// Branch this primitive stands in for
    pub branch: BranchId,
    /// `[start, end]`, copied from the branch
    pub nodes: [NodeId; 2],
    pub kind: CompanionKind,
}

impl CompanionModel {
    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn end(&self) -> NodeId {
        self.nodes[1]
    }

    pub fn is_self_loop(&self) -> bool {
        self.nodes[0] == self.nodes[1]
    }

    /// Whether this primitive needs a current unknown.
    pub fn is_battery(&self) -> bool {
        matches!(self.kind, CompanionKind::Battery(_))
    }
}

/// Append the companion primitives for one branch.
///
/// Storage elements produce a Norton pair on the same branch; an open switch
/// produces nothing.
pub fn build_companions(branch: &Branch, dt: f64, out: &mut Vec<CompanionModel>) {
    let mut push = |kind| {
        out.push(CompanionModel {
            branch: branch.id,
            nodes: branch.nodes,
            kind,
        })
    };

    match &branch.component {
        Component::Battery(b) => push(CompanionKind::Battery(b.voltage)),
        Component::Resistor(r) if r.is_short() => push(CompanionKind::Battery(0.0)),
        Component::Resistor(r) => push(CompanionKind::Resistor(r.resistance)),
        Component::Wire(w) if w.is_ideal() => push(CompanionKind::Battery(0.0)),
        Component::Wire(w) => push(CompanionKind::Resistor(w.resistance)),
        Component::Capacitor(c) => {
            push(CompanionKind::Resistor(c.companion_resistance(dt)));
            push(CompanionKind::CurrentSource(c.history_current(dt)));
        }
        Component::Inductor(l) => {
            push(CompanionKind::Resistor(l.companion_resistance(dt)));
            push(CompanionKind::CurrentSource(l.history_current()));
        }
        Component::Switch(s) if s.closed => push(CompanionKind::Battery(0.0)),
        Component::Switch(_) => {}
        Component::CurrentSource(i) => push(CompanionKind::CurrentSource(i.current)),
    }
}

/// Rebuild `out` with the companion network of the whole circuit, in branch
/// order.
pub fn companion_models(circuit: &Circuit, dt: f64, out: &mut Vec<CompanionModel>) {
    out.clear();
    for branch in circuit.branches() {
        build_companions(branch, dt, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Capacitor, Inductor, Resistor, Switch, Wire};
    use approx::assert_relative_eq;

    fn branch(component: Component) -> Branch {
        Branch {
            id: BranchId(7),
            name: "X".to_string(),
            nodes: [NodeId(0), NodeId(1)],
            length: 1.0,
            component,
        }
    }

    fn build(component: Component, dt: f64) -> Vec<CompanionModel> {
        let mut out = Vec::new();
        build_companions(&branch(component), dt, &mut out);
        out
    }

    #[test]
    fn test_short_resistor_becomes_battery() {
        let out = build(Component::Resistor(Resistor::new(0.0)), 1e-3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, CompanionKind::Battery(0.0));

        let out = build(Component::Resistor(Resistor::new(10.0)), 1e-3);
        assert_eq!(out[0].kind, CompanionKind::Resistor(10.0));
    }

    #[test]
    fn test_wires_and_switches() {
        assert_eq!(
            build(Component::Wire(Wire::ideal()), 1e-3)[0].kind,
            CompanionKind::Battery(0.0)
        );
        assert_eq!(
            build(Component::Wire(Wire::with_resistance(0.5)), 1e-3)[0].kind,
            CompanionKind::Resistor(0.5)
        );
        assert_eq!(
            build(Component::Switch(Switch::new(true)), 1e-3)[0].kind,
            CompanionKind::Battery(0.0)
        );
        assert!(build(Component::Switch(Switch::new(false)), 1e-3).is_empty());
    }

    #[test]
    fn test_capacitor_norton_pair() {
        let out = build(Component::Capacitor(Capacitor::with_voltage(2e-3, 3.0)), 1e-3);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| m.branch == BranchId(7)));
        match (out[0].kind, out[1].kind) {
            (CompanionKind::Resistor(r), CompanionKind::CurrentSource(i)) => {
                assert_relative_eq!(r, 0.5);
                assert_relative_eq!(i, -6.0);
            }
            other => panic!("unexpected companions {:?}", other),
        }
    }

    #[test]
    fn test_inductor_norton_pair() {
        let mut l = Inductor::new(0.1);
        l.current = 0.25;
        let out = build(Component::Inductor(l), 1e-2);
        match (out[0].kind, out[1].kind) {
            (CompanionKind::Resistor(r), CompanionKind::CurrentSource(i)) => {
                assert_relative_eq!(r, 10.0);
                assert_relative_eq!(i, 0.25);
            }
            other => panic!("unexpected companions {:?}", other),
        }
    }

    #[test]
    fn test_circuit_order_is_branch_order() {
        let ast = crate::dsl::parse("B1 0 a 12\nSW1 a b open\nR1 b 0 4\n").unwrap();
        let circuit = Circuit::from_ast(ast).unwrap();
        let mut out = vec![CompanionModel {
            branch: BranchId(99),
            nodes: [NodeId(0), NodeId(0)],
            kind: CompanionKind::Resistor(1.0),
        }];
        companion_models(&circuit, 1e-3, &mut out);

        let branches: Vec<_> = out.iter().map(|m| m.branch).collect();
        assert_eq!(branches, vec![BranchId(0), BranchId(2)]);
    }
}
