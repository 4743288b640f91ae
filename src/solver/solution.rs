//! Results of a single linear solve.

use std::collections::HashMap;

use super::pool::Recycle;
use crate::circuit::{BranchId, NodeId, Probe};

/// Solved quantities for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BranchReading {
    /// Current, positive from start to end
    pub current: f64,
    /// `V(start) - V(end)`
    pub voltage: f64,
    /// False when the branch sits in a singular island or on isolated nodes
    pub defined: bool,
}

/// Node voltages and branch readings for one sub-step.
///
/// Undefined quantities read as zero so NaN never reaches the view layer.
#[derive(Debug, Clone, Default)]
pub struct MnaSolution {
    voltages: Vec<f64>,
    defined: Vec<bool>,
    branches: HashMap<BranchId, BranchReading>,
    singular_islands: usize,
}

impl Recycle for MnaSolution {
    fn recycle(&mut self) {
        self.voltages.clear();
        self.defined.clear();
        self.branches.clear();
        self.singular_islands = 0;
    }
}

impl MnaSolution {
    pub fn new(node_count: usize) -> Self {
        let mut solution = Self::default();
        solution.reset(node_count);
        solution
    }

    /// Blank the solution for a circuit of `node_count` nodes.
    pub fn reset(&mut self, node_count: usize) {
        self.recycle();
        self.voltages.resize(node_count, 0.0);
        self.defined.resize(node_count, false);
    }

    pub fn node_count(&self) -> usize {
        self.voltages.len()
    }

    pub fn set_node_voltage(&mut self, node: NodeId, voltage: f64) {
        self.voltages[node.0] = voltage;
        self.defined[node.0] = true;
    }

    /// Voltage of a node; zero if undefined or unknown.
    pub fn node_voltage(&self, node: NodeId) -> f64 {
        self.voltages.get(node.0).copied().unwrap_or(0.0)
    }

    pub fn is_node_defined(&self, node: NodeId) -> bool {
        self.defined.get(node.0).copied().unwrap_or(false)
    }

    /// Add a companion's contribution to a branch reading.
    ///
    /// Storage elements are solved as two parallel companions, so currents
    /// accumulate while the voltage is shared.
    pub fn accumulate(&mut self, branch: BranchId, current: f64, voltage: f64, defined: bool) {
        let reading = self.branches.entry(branch).or_insert(BranchReading {
            current: 0.0,
            voltage,
            defined,
        });
        reading.current += current;
        reading.voltage = voltage;
        reading.defined &= defined;
    }

    /// Record a reading for a branch that was not part of the solve.
    pub fn insert_branch(&mut self, branch: BranchId, reading: BranchReading) {
        self.branches.insert(branch, reading);
    }

    pub fn branch(&self, branch: BranchId) -> Option<&BranchReading> {
        self.branches.get(&branch)
    }

    pub fn contains_branch(&self, branch: BranchId) -> bool {
        self.branches.contains_key(&branch)
    }

    pub fn branch_current(&self, branch: BranchId) -> f64 {
        self.branches.get(&branch).map(|r| r.current).unwrap_or(0.0)
    }

    pub fn branch_voltage(&self, branch: BranchId) -> f64 {
        self.branches.get(&branch).map(|r| r.voltage).unwrap_or(0.0)
    }

    pub fn is_branch_defined(&self, branch: BranchId) -> bool {
        self.branches.get(&branch).map(|r| r.defined).unwrap_or(false)
    }

    /// All branch readings, in no particular order.
    pub fn branches(&self) -> impl Iterator<Item = (BranchId, &BranchReading)> + '_ {
        self.branches.iter().map(|(&id, r)| (id, r))
    }

    /// Read a probe.
    pub fn value(&self, probe: Probe) -> f64 {
        match probe {
            Probe::NodeVoltage(n) => self.node_voltage(n),
            Probe::BranchCurrent(b) => self.branch_current(b),
            Probe::BranchVoltage(b) => self.branch_voltage(b),
        }
    }

    pub fn is_defined(&self, probe: Probe) -> bool {
        match probe {
            Probe::NodeVoltage(n) => self.is_node_defined(n),
            Probe::BranchCurrent(b) | Probe::BranchVoltage(b) => self.is_branch_defined(b),
        }
    }

    pub(crate) fn mark_singular(&mut self) {
        self.singular_islands += 1;
    }

    /// Number of islands that could not be solved.
    pub fn singular_islands(&self) -> usize {
        self.singular_islands
    }
}
