//! Core identifier types for circuit topology.

use std::fmt;

/// A dense identifier for a junction in the circuit.
///
/// Node ids index directly into per-node solver vectors, so they are handed
/// out sequentially by [`Circuit`](super::Circuit) and never reused. There is
/// no fixed ground node: the assembler picks one reference node per island.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Index of this node in dense per-node storage.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// A stable identifier for a branch in the circuit.
///
/// Branch ids survive removal of other branches; they are not positions in the
/// branch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A quantity the view layer can read back from a solved frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Voltage of a node relative to its island's reference node
    NodeVoltage(NodeId),
    /// Current through a branch, positive from start to end
    BranchCurrent(BranchId),
    /// Voltage across a branch, `V(start) - V(end)`
    BranchVoltage(BranchId),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::NodeVoltage(n) => write!(f, "V({})", n),
            Probe::BranchCurrent(b) => write!(f, "I({})", b),
            Probe::BranchVoltage(b) => write!(f, "V({})", b),
        }
    }
}
