//! MNA equation assembly.

use std::collections::HashMap;
use std::mem;

use super::companion::{CompanionKind, CompanionModel};
use super::equation::{Equation, EquationKind, MnaArena, Unknown};
use super::pool::{Handle, OwnerId};
use crate::circuit::NodeId;
use crate::error::Result;

fn find_root(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn union_roots(parent: &mut [usize], a: usize, b: usize) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra != rb {
        // Keep the lower index as root so the root is the island ground
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi] = lo;
    }
}

/// A connected part of the companion network, solved on its own.
#[derive(Debug, Clone, Default)]
pub struct Island {
    /// Reference node, pinned to 0 V
    pub ground: NodeId,
    /// All nodes of the island in ascending order, ground first
    pub nodes: Vec<NodeId>,
    /// Node voltages (ground excluded) followed by battery currents
    pub unknowns: Vec<Unknown>,
    /// KCL rows followed by definition rows; one per unknown
    pub equations: Vec<Handle<Equation>>,
    /// Indices into [`MnaCircuit::companions`]
    pub companions: Vec<usize>,
    index: HashMap<Unknown, usize>,
}

impl Island {
    fn reset(&mut self, ground: NodeId) {
        self.ground = ground;
        self.nodes.clear();
        self.nodes.push(ground);
        self.unknowns.clear();
        self.equations.clear();
        self.companions.clear();
        self.index.clear();
    }

    /// Column of an unknown in this island's system.
    pub fn unknown_index(&self, unknown: Unknown) -> Option<usize> {
        self.index.get(&unknown).copied()
    }

    /// Dimension of this island's system.
    pub fn size(&self) -> usize {
        self.unknowns.len()
    }

    fn push_unknown(&mut self, unknown: Unknown) {
        self.index.insert(unknown, self.unknowns.len());
        self.unknowns.push(unknown);
    }
}

/// Buffers an [`MnaCircuit`] assembles into.
///
/// Hand one to [`MnaCircuit::with_scratch`] and take it back from
/// [`MnaCircuit::finish`]; after the first few sub-steps every vector has the
/// capacity it needs.
#[derive(Debug, Default)]
pub struct MnaScratch {
    /// Companion models to assemble
    pub companions: Vec<CompanionModel>,
    parent: Vec<usize>,
    active: Vec<bool>,
    island_of_root: Vec<Option<usize>>,
    kcl: Vec<Option<Handle<Equation>>>,
    islands: Vec<Island>,
    live_islands: usize,
    isolated: Vec<NodeId>,
}

impl MnaScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, node_count: usize) {
        self.parent.clear();
        self.parent.extend(0..node_count);
        self.active.clear();
        self.active.resize(node_count, false);
        self.island_of_root.clear();
        self.island_of_root.resize(node_count, None);
        self.kcl.clear();
        self.kcl.resize(node_count, None);
        self.live_islands = 0;
        self.isolated.clear();
    }

    /// Start a new island, recycling one from an earlier sub-step if possible.
    fn open_island(&mut self, ground: NodeId) -> usize {
        let i = self.live_islands;
        if i == self.islands.len() {
            self.islands.push(Island::default());
        }
        self.islands[i].reset(ground);
        self.live_islands += 1;
        i
    }
}

/// The equation set for one sub-step.
///
/// Borrows the arena for its whole life; every term and equation it creates
/// is owned by its [`OwnerId`] and handed back to the arena on drop.
pub struct MnaCircuit<'a> {
    arena: &'a mut MnaArena,
    owner: OwnerId,
    node_count: usize,
    scratch: MnaScratch,
}

impl<'a> MnaCircuit<'a> {
    /// Assemble the equations for a companion network over nodes
    /// `0..node_count`.
    pub fn new(
        arena: &'a mut MnaArena,
        node_count: usize,
        companions: Vec<CompanionModel>,
    ) -> Result<Self> {
        let scratch = MnaScratch {
            companions,
            ..MnaScratch::default()
        };
        Self::with_scratch(arena, node_count, scratch)
    }

    /// Assemble `scratch.companions`, reusing the rest of `scratch`.
    pub fn with_scratch(
        arena: &'a mut MnaArena,
        node_count: usize,
        mut scratch: MnaScratch,
    ) -> Result<Self> {
        scratch.reset(node_count);
        let owner = arena.allocate_owner();
        let mut circuit = Self {
            arena,
            owner,
            node_count,
            scratch,
        };
        circuit.partition();
        circuit.assemble()?;
        Ok(circuit)
    }

    fn partition(&mut self) {
        let s = &mut self.scratch;

        for model in s.companions.iter().filter(|m| !m.is_self_loop()) {
            let (a, b) = (model.start().0, model.end().0);
            s.active[a] = true;
            s.active[b] = true;
            union_roots(&mut s.parent, a, b);
        }

        // Ascending scan: the first node seen in a set is its root and ground
        for node in 0..self.node_count {
            if !s.active[node] {
                log::trace!("{} is inactive this sub-step", NodeId(node));
                s.isolated.push(NodeId(node));
                continue;
            }
            let root = find_root(&mut s.parent, node);
            let slot = s.island_of_root[root];
            match slot {
                Some(i) => s.islands[i].nodes.push(NodeId(node)),
                None => {
                    let i = s.open_island(NodeId(node));
                    s.island_of_root[root] = Some(i);
                }
            }
        }

        for (i, model) in s.companions.iter().enumerate() {
            if model.is_self_loop() {
                continue;
            }
            let root = find_root(&mut s.parent, model.start().0);
            if let Some(island) = s.island_of_root[root] {
                s.islands[island].companions.push(i);
            }
        }
    }

    fn assemble(&mut self) -> Result<()> {
        let owner = self.owner;
        let s = &mut self.scratch;
        let live = s.live_islands;
        let islands = &mut s.islands[..live];

        for island in islands.iter_mut() {
            for k in 1..island.nodes.len() {
                let node = island.nodes[k];
                island.push_unknown(Unknown::Voltage(node));
                let eq = self.arena.add_equation(owner, EquationKind::Kcl(node));
                island.equations.push(eq);
                s.kcl[node.0] = Some(eq);
            }
            for k in 0..island.companions.len() {
                let model = &s.companions[island.companions[k]];
                if model.is_battery() {
                    island.push_unknown(Unknown::Current(model.branch));
                }
            }
        }

        for island in islands.iter_mut() {
            let ground = island.ground;
            let voltage = |node: NodeId| (node != ground).then_some(Unknown::Voltage(node));

            for &i in &island.companions {
                let model = s.companions[i];
                let (a, b) = (model.start(), model.end());
                let (eq_a, eq_b) = (s.kcl[a.0], s.kcl[b.0]);

                match model.kind {
                    CompanionKind::Resistor(r) => {
                        let g = 1.0 / r;
                        // Current leaving a is (Va - Vb) / R, leaving b the negative
                        for (eq, this, other) in [(eq_a, a, b), (eq_b, b, a)] {
                            let Some(eq) = eq else { continue };
                            if let Some(u) = voltage(this) {
                                self.arena.add_term(owner, eq, g, u)?;
                            }
                            if let Some(u) = voltage(other) {
                                self.arena.add_term(owner, eq, -g, u)?;
                            }
                        }
                    }
                    CompanionKind::CurrentSource(j) => {
                        if let Some(eq) = eq_a {
                            self.arena.add_rhs(eq, -j);
                        }
                        if let Some(eq) = eq_b {
                            self.arena.add_rhs(eq, j);
                        }
                    }
                    CompanionKind::Battery(v) => {
                        let current = Unknown::Current(model.branch);
                        if let Some(eq) = eq_a {
                            self.arena.add_term(owner, eq, 1.0, current)?;
                        }
                        if let Some(eq) = eq_b {
                            self.arena.add_term(owner, eq, -1.0, current)?;
                        }

                        let def = self
                            .arena
                            .add_equation(owner, EquationKind::Definition(model.branch));
                        if let Some(u) = voltage(b) {
                            self.arena.add_term(owner, def, 1.0, u)?;
                        }
                        if let Some(u) = voltage(a) {
                            self.arena.add_term(owner, def, -1.0, u)?;
                        }
                        self.arena.add_rhs(def, v);
                        island.equations.push(def);
                    }
                }
            }

            log::trace!(
                "island at {}: {} nodes, {} unknowns",
                ground,
                island.nodes.len(),
                island.size()
            );
        }

        Ok(())
    }

    /// Owner tag of everything this assembly created.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// The arena holding this assembly's terms and equations.
    pub fn arena(&self) -> &MnaArena {
        self.arena
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn companions(&self) -> &[CompanionModel] {
        &self.scratch.companions
    }

    pub fn islands(&self) -> &[Island] {
        &self.scratch.islands[..self.scratch.live_islands]
    }

    /// Nodes touched by no active, non-degenerate branch.
    pub fn isolated_nodes(&self) -> &[NodeId] {
        &self.scratch.isolated
    }

    /// Total number of equations over all islands.
    pub fn equation_count(&self) -> usize {
        self.islands().iter().map(|i| i.equations.len()).sum()
    }

    /// Release the assembly and hand back its buffers for reuse.
    pub fn finish(mut self) -> MnaScratch {
        mem::take(&mut self.scratch)
    }
}

impl Drop for MnaCircuit<'_> {
    fn drop(&mut self) {
        self.arena.release(self.owner);
        let balance = self.arena.retire(self.owner);
        if let Err(e) = &balance {
            log::error!("{}", e);
        }
        debug_assert!(balance.is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::BranchId;

    fn model(branch: usize, a: usize, b: usize, kind: CompanionKind) -> CompanionModel {
        CompanionModel {
            branch: BranchId(branch),
            nodes: [NodeId(a), NodeId(b)],
            kind,
        }
    }

    #[test]
    fn test_unknowns_and_equations_match() {
        let mut arena = MnaArena::new();
        let companions = vec![
            model(0, 0, 1, CompanionKind::Battery(12.0)),
            model(1, 1, 2, CompanionKind::Resistor(2.0)),
            model(2, 2, 0, CompanionKind::Resistor(4.0)),
        ];
        let circuit = MnaCircuit::new(&mut arena, 3, companions).unwrap();

        assert_eq!(circuit.islands().len(), 1);
        let island = &circuit.islands()[0];
        assert_eq!(island.ground, NodeId(0));
        assert_eq!(
            island.unknowns,
            vec![
                Unknown::Voltage(NodeId(1)),
                Unknown::Voltage(NodeId(2)),
                Unknown::Current(BranchId(0)),
            ]
        );
        assert_eq!(island.equations.len(), island.size());
        assert_eq!(circuit.equation_count(), 3);
    }

    #[test]
    fn test_islands_isolated_nodes_and_self_loops() {
        let mut arena = MnaArena::new();
        let companions = vec![
            model(0, 0, 1, CompanionKind::Resistor(1.0)),
            model(1, 3, 4, CompanionKind::Resistor(1.0)),
            model(2, 2, 2, CompanionKind::Battery(0.0)),
        ];
        let circuit = MnaCircuit::new(&mut arena, 5, companions).unwrap();

        let grounds: Vec<_> = circuit.islands().iter().map(|i| i.ground).collect();
        assert_eq!(grounds, vec![NodeId(0), NodeId(3)]);
        assert_eq!(circuit.isolated_nodes(), &[NodeId(2)]);
        assert!(circuit
            .islands()
            .iter()
            .all(|i| !i.companions.contains(&2)));
    }

    #[test]
    fn test_drop_releases_arena() {
        let mut arena = MnaArena::new();
        let companions = vec![
            model(0, 0, 1, CompanionKind::Battery(5.0)),
            model(1, 1, 0, CompanionKind::Resistor(5.0)),
        ];
        let circuit = MnaCircuit::new(&mut arena, 2, companions).unwrap();
        let owner = circuit.owner();
        let scratch = circuit.finish();

        assert_eq!(scratch.companions.len(), 2);
        assert_eq!(arena.terms.owned_count(owner), 0);
        assert_eq!(arena.equations.owned_count(owner), 0);
        assert_eq!(arena.terms.live_count(), 0);
        assert!(arena.terms.reserve_count() > 0);
    }

    #[test]
    fn test_scratch_reused_across_assemblies() {
        let mut arena = MnaArena::new();
        let mut scratch = MnaScratch::new();
        scratch.companions.extend([
            model(0, 0, 1, CompanionKind::Battery(1.0)),
            model(1, 1, 0, CompanionKind::Resistor(1.0)),
            model(2, 2, 3, CompanionKind::Resistor(1.0)),
        ]);

        let circuit = MnaCircuit::with_scratch(&mut arena, 4, scratch).unwrap();
        assert_eq!(circuit.islands().len(), 2);
        let mut scratch = circuit.finish();
        let islands = scratch.islands.as_ptr();
        let kcl = scratch.kcl.as_ptr();

        // Same nodes, one island fewer: the spare island stays allocated
        scratch.companions.truncate(2);
        let circuit = MnaCircuit::with_scratch(&mut arena, 4, scratch).unwrap();
        assert_eq!(circuit.islands().len(), 1);
        assert_eq!(circuit.isolated_nodes(), &[NodeId(2), NodeId(3)]);
        assert_eq!(circuit.equation_count(), 2);
        let scratch = circuit.finish();

        assert_eq!(scratch.islands.len(), 2);
        assert_eq!(scratch.islands.as_ptr(), islands);
        assert_eq!(scratch.kcl.as_ptr(), kcl);
    }

    #[test]
    fn test_current_source_only_touches_rhs() {
        let mut arena = MnaArena::new();
        let companions = vec![
            model(0, 0, 1, CompanionKind::CurrentSource(2.0)),
            model(1, 1, 0, CompanionKind::Resistor(3.0)),
        ];
        let circuit = MnaCircuit::new(&mut arena, 2, companions).unwrap();
        let eq = circuit.islands()[0].equations[0];

        // Only the resistor contributes a term at node 1; the source sits in the rhs
        assert_eq!(circuit.arena().terms_of(eq).count(), 1);
        let rhs = circuit.arena().equations.get(eq).unwrap().rhs;
        assert_eq!(rhs, 2.0);
    }
}
