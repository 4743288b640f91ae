//! Pooled charge carriers grouped by branch.

use std::collections::HashMap;

use crate::circuit::{Branch, BranchId, BranchListener, Circuit};
use crate::solver::{Handle, OwnerAllocator, OwnerId, Pool, Recycle};

/// A charge carrier somewhere along a branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Electron {
    pub branch: BranchId,
    /// Distance from the branch's start node, `0..=length`
    pub distance: f64,
}

impl Default for Electron {
    fn default() -> Self {
        Self {
            branch: BranchId(0),
            distance: 0.0,
        }
    }
}

impl Recycle for Electron {
    fn recycle(&mut self) {
        *self = Self::default();
    }
}

/// All carriers in the circuit.
///
/// Each branch's carriers are owned by a per-branch [`OwnerId`], so removing a
/// branch releases exactly its carriers. The set subscribes to the circuit as a
/// [`BranchListener`] to lay out new branches and clear removed ones.
#[derive(Debug)]
pub struct ElectronSet {
    pool: Pool<Electron>,
    owners: OwnerAllocator,
    groups: HashMap<BranchId, OwnerId>,
    density: f64,
}

impl ElectronSet {
    /// Create an empty set targeting `density` carriers per unit length.
    pub fn new(density: f64) -> Self {
        Self {
            pool: Pool::new(),
            owners: OwnerAllocator::new(),
            groups: HashMap::new(),
            density,
        }
    }

    /// Target carriers per unit length.
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Number of carriers a branch of `length` should hold.
    pub fn target_count(&self, length: f64) -> usize {
        (length * self.density).round().max(0.0) as usize
    }

    pub(crate) fn group(&mut self, branch: BranchId) -> OwnerId {
        let owners = &mut self.owners;
        *self.groups.entry(branch).or_insert_with(|| owners.allocate())
    }

    /// Replace a branch's carriers with an even layout at the target density.
    pub fn layout_branch(&mut self, branch: &Branch) {
        let owner = self.group(branch.id);
        self.pool.destroy_all_owned_by(owner);

        let count = self.target_count(branch.length);
        let spacing = branch.length / count.max(1) as f64;
        for i in 0..count {
            self.pool.create(
                owner,
                Electron {
                    branch: branch.id,
                    distance: (i as f64 + 0.5) * spacing,
                },
            );
        }
        log::trace!("laid out {} carriers on {}", count, branch.name);
    }

    /// Lay out every branch of `circuit` from scratch.
    pub fn layout_all(&mut self, circuit: &Circuit) {
        self.clear();
        for branch in circuit.branches() {
            self.layout_branch(branch);
        }
    }

    /// Release a branch's carriers and retire its group.
    pub fn remove_branch(&mut self, branch: BranchId) -> usize {
        let Some(owner) = self.groups.remove(&branch) else {
            return 0;
        };
        let released = self.pool.destroy_all_owned_by(owner);
        if let Err(e) = self.pool.retire_owner(owner) {
            log::error!("{}", e);
        }
        released
    }

    /// Release every carrier.
    pub fn clear(&mut self) {
        self.pool.reset();
        self.groups.clear();
    }

    /// Carriers currently on `branch`.
    pub fn count_on(&self, branch: BranchId) -> usize {
        self.groups
            .get(&branch)
            .map(|&owner| self.pool.owned_count(owner))
            .unwrap_or(0)
    }

    /// Whether `branch` has a carrier group.
    pub fn has_group(&self, branch: BranchId) -> bool {
        self.groups.contains_key(&branch)
    }

    pub fn len(&self) -> usize {
        self.pool.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All carriers, in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &Electron> + '_ {
        self.pool.iter().map(|(_, e)| e)
    }

    /// Carriers on one branch.
    pub fn iter_on(&self, branch: BranchId) -> impl Iterator<Item = &Electron> + '_ {
        self.groups
            .get(&branch)
            .into_iter()
            .flat_map(move |&owner| self.pool.iter_owned_by(owner).map(|(_, e)| e))
    }

    /// `(branch, distance)` of every carrier, for rendering.
    pub fn positions(&self) -> Vec<(BranchId, f64)> {
        self.iter().map(|e| (e.branch, e.distance)).collect()
    }

    pub(crate) fn pool(&self) -> &Pool<Electron> {
        &self.pool
    }

    pub(crate) fn pool_mut(&mut self) -> &mut Pool<Electron> {
        &mut self.pool
    }

    /// Move a carrier into another branch's group.
    pub(crate) fn reassign(&mut self, handle: Handle<Electron>, branch: BranchId, distance: f64) {
        let owner = self.group(branch);
        if let Some(e) = self.pool.get_mut(handle) {
            e.branch = branch;
            e.distance = distance;
        }
        if let Err(e) = self.pool.transfer(handle, owner) {
            log::trace!("{}", e);
        }
    }
}

impl BranchListener for ElectronSet {
    fn branch_added(&mut self, branch: &Branch) {
        self.layout_branch(branch);
    }

    fn branch_removed(&mut self, branch: &Branch) {
        let released = self.remove_branch(branch.id);
        log::trace!("released {} carriers from {}", released, branch.name);
    }
}
