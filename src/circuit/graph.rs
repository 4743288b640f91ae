//! Circuit graph structure.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::types::{BranchId, NodeId};
use super::validate::{validate_component, validate_length};
use crate::components::Component;
use crate::dsl::CircuitAst;
use crate::error::{Result, VoltaicError};

/// Length given to branches created without an explicit one.
pub const DEFAULT_BRANCH_LENGTH: f64 = 1.0;

/// A two-terminal element placed between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Stable identifier
    pub id: BranchId,
    /// Unique name
    pub name: String,
    /// `[start, end]`; positive current flows start to end
    pub nodes: [NodeId; 2],
    /// Geometric length used for carrier layout
    pub length: f64,
    /// The element and its per-sub-step state
    pub component: Component,
}

impl Branch {
    /// Start node.
    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }

    /// End node.
    pub fn end(&self) -> NodeId {
        self.nodes[1]
    }

    /// Whether both terminals sit on the same node.
    pub fn is_self_loop(&self) -> bool {
        self.nodes[0] == self.nodes[1]
    }

    /// Whether the branch touches `node`.
    pub fn touches(&self, node: NodeId) -> bool {
        self.nodes[0] == node || self.nodes[1] == node
    }
}

/// Observer for topology changes.
///
/// Listeners are called synchronously from inside [`Circuit::add_branch`]
/// and [`Circuit::remove_branch`] and must not call back into the circuit.
pub trait BranchListener {
    /// A branch was added to the circuit.
    fn branch_added(&mut self, branch: &Branch);

    /// A branch was removed; it is passed by reference one last time.
    fn branch_removed(&mut self, branch: &Branch);
}

/// A circuit topology: named nodes and an ordered list of branches.
///
/// Branch order is insertion order and is the iteration order used by every
/// solver pass, which keeps frames deterministic.
pub struct Circuit {
    branches: Vec<Branch>,
    /// BranchId -> position in `branches`
    positions: HashMap<BranchId, usize>,
    node_map: HashMap<String, NodeId>,
    node_names: Vec<String>,
    next_branch: usize,
    listeners: Vec<Rc<RefCell<dyn BranchListener>>>,
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("nodes", &self.node_names)
            .field("branches", &self.branches)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            positions: HashMap::new(),
            node_map: HashMap::new(),
            node_names: Vec::new(),
            next_branch: 0,
            listeners: Vec::new(),
        }
    }

    /// Build a circuit from a parsed netlist.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut circuit = Self::new();

        for name in &ast.nodes {
            circuit.add_node(name);
        }

        for def in &ast.components {
            let component = Component::from_def(def)?;
            let start = circuit.add_node(&def.nodes[0]);
            let end = circuit.add_node(&def.nodes[1]);
            let length = def.length().unwrap_or(DEFAULT_BRANCH_LENGTH);
            circuit.add_branch_with_length(&def.name, start, end, component, length)?;
        }

        Ok(circuit)
    }

    /// Get or create the node called `name`.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.node_map.get(name) {
            return id;
        }
        let id = NodeId(self.node_names.len());
        self.node_map.insert(name.to_string(), id);
        self.node_names.push(name.to_string());
        id
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.node_names[node.0]
    }

    /// Number of nodes ever created; node ids are `0..node_count()`.
    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Add a branch of default length.
    pub fn add_branch(
        &mut self,
        name: &str,
        start: NodeId,
        end: NodeId,
        component: Component,
    ) -> Result<BranchId> {
        self.add_branch_with_length(name, start, end, component, DEFAULT_BRANCH_LENGTH)
    }

    /// Add a branch and notify listeners.
    pub fn add_branch_with_length(
        &mut self,
        name: &str,
        start: NodeId,
        end: NodeId,
        component: Component,
        length: f64,
    ) -> Result<BranchId> {
        if self.find_branch(name).is_some() {
            return Err(VoltaicError::DuplicateBranch {
                name: name.to_string(),
            });
        }
        for node in [start, end] {
            if node.0 >= self.node_count() {
                return Err(VoltaicError::NodeNotFound {
                    node: node.to_string(),
                });
            }
        }
        validate_component(name, &component)?;
        validate_length(name, length)?;

        let id = BranchId(self.next_branch);
        self.next_branch += 1;

        self.positions.insert(id, self.branches.len());
        self.branches.push(Branch {
            id,
            name: name.to_string(),
            nodes: [start, end],
            length,
            component,
        });

        let branch = &self.branches[self.branches.len() - 1];
        log::debug!("added {} ({}) {} -> {}", branch.name, branch.component.kind(), start, end);
        for listener in &self.listeners {
            listener.borrow_mut().branch_added(branch);
        }

        Ok(id)
    }

    /// Remove a branch and notify listeners.
    ///
    /// Its nodes stay allocated; one left with no branches is warned about here
    /// and reads as undefined from then on.
    pub fn remove_branch(&mut self, id: BranchId) -> Result<Branch> {
        let position = self.position(id)?;
        let branch = self.branches.remove(position);

        self.positions.remove(&id);
        for (i, b) in self.branches.iter().enumerate().skip(position) {
            self.positions.insert(b.id, i);
        }
        log::debug!("removed {}", branch.name);
        let ends = if branch.is_self_loop() { 1 } else { 2 };
        for &node in &branch.nodes[..ends] {
            if self.branches_at(node).next().is_none() {
                log::warn!("node '{}' is no longer connected", self.node_name(node));
            }
        }

        for listener in &self.listeners {
            listener.borrow_mut().branch_removed(&branch);
        }

        Ok(branch)
    }

    /// Subscribe a listener to branch additions and removals.
    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn BranchListener>>) {
        self.listeners.push(listener);
    }

    fn position(&self, id: BranchId) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| VoltaicError::BranchNotFound {
                branch: id.to_string(),
            })
    }

    /// Look up a branch by id.
    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.positions.get(&id).map(|&i| &self.branches[i])
    }

    /// Look up a branch by name.
    pub fn find_branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// All branches in iteration order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub(crate) fn branches_mut(&mut self) -> &mut [Branch] {
        &mut self.branches
    }

    /// Branches with a terminal on `node`, in iteration order.
    pub fn branches_at(&self, node: NodeId) -> impl Iterator<Item = &Branch> + '_ {
        self.branches.iter().filter(move |b| b.touches(node))
    }

    /// Mutable access to a branch's component for in-place parameter edits.
    ///
    /// Values written here are not validated; use [`Circuit::set_component`]
    /// for checked replacement.
    pub fn component_mut(&mut self, id: BranchId) -> Result<&mut Component> {
        let position = self.position(id)?;
        Ok(&mut self.branches[position].component)
    }

    /// Replace a branch's component, e.g. after a slider edit.
    pub fn set_component(&mut self, id: BranchId, component: Component) -> Result<()> {
        let position = self.position(id)?;
        validate_component(&self.branches[position].name, &component)?;
        self.branches[position].component = component;
        Ok(())
    }

    /// Open or close a switch.
    pub fn set_switch(&mut self, id: BranchId, closed: bool) -> Result<()> {
        let position = self.position(id)?;
        let branch = &mut self.branches[position];
        match &mut branch.component {
            Component::Switch(s) => {
                s.set_state(closed);
                Ok(())
            }
            other => Err(VoltaicError::invalid_parameter(
                &branch.name,
                "state",
                format!("{} is not a switch", other.kind()),
            )),
        }
    }

    /// Resize a branch.
    pub fn set_length(&mut self, id: BranchId, length: f64) -> Result<()> {
        let position = self.position(id)?;
        validate_length(&self.branches[position].name, length)?;
        self.branches[position].length = length;
        Ok(())
    }

    /// Total energy held in capacitors and inductors.
    pub fn stored_energy(&self) -> f64 {
        self.branches.iter().map(|b| b.component.stored_energy()).sum()
    }
}
