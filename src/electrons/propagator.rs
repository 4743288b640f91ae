//! Carrier motion driven by solved branch currents.

use std::collections::HashMap;

use super::electron_set::{Electron, ElectronSet};
use crate::circuit::{Branch, BranchId, Circuit, NodeId, Probe};
use crate::solver::{DynamicSolution, Handle};

/// Direction carriers move relative to the solved current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarrierMode {
    /// Carriers move with conventional current, + to -
    #[default]
    Conventional,
    /// Carriers move against conventional current, like real electrons
    Electrons,
}

impl CarrierMode {
    fn sign(self) -> f64 {
        match self {
            CarrierMode::Conventional => 1.0,
            CarrierMode::Electrons => -1.0,
        }
    }
}

/// Default carrier speed per ampere (length units per second).
pub const DEFAULT_SPEED_SCALE: f64 = 1.0;

/// Default cap on per-frame motion, as a fraction of carrier spacing.
pub const DEFAULT_MAX_STEP_FRACTION: f64 = 0.5;

/// Default relative tolerance before a branch is re-laid out.
pub const DEFAULT_DENSITY_TOLERANCE: f64 = 0.5;

/// Junction hops allowed per carrier per frame.
const MAX_HOPS: usize = 16;

/// Advances carriers by the frame's time-averaged currents and keeps every
/// branch near the target density.
#[derive(Debug)]
pub struct ConstantDensityPropagator {
    speed_scale: f64,
    max_step_fraction: f64,
    tolerance: f64,
    mode: CarrierMode,
    // Scratch reused across frames
    displacement: HashMap<BranchId, f64>,
    counts: HashMap<BranchId, usize>,
    handles: Vec<Handle<Electron>>,
}

impl Default for ConstantDensityPropagator {
    fn default() -> Self {
        Self::new(
            DEFAULT_SPEED_SCALE,
            DEFAULT_MAX_STEP_FRACTION,
            DEFAULT_DENSITY_TOLERANCE,
            CarrierMode::default(),
        )
    }
}

impl ConstantDensityPropagator {
    pub fn new(speed_scale: f64, max_step_fraction: f64, tolerance: f64, mode: CarrierMode) -> Self {
        Self {
            speed_scale,
            max_step_fraction,
            tolerance,
            mode,
            displacement: HashMap::new(),
            counts: HashMap::new(),
            handles: Vec::new(),
        }
    }

    pub fn mode(&self) -> CarrierMode {
        self.mode
    }

    /// Signed distance carriers on `branch` moved in the last frame.
    pub fn displacement(&self, branch: BranchId) -> f64 {
        self.displacement.get(&branch).copied().unwrap_or(0.0)
    }

    /// Move every carrier for a frame of length `elapsed`, then restore
    /// density on branches that drifted out of tolerance.
    pub fn propagate(
        &mut self,
        circuit: &Circuit,
        frame: &DynamicSolution,
        electrons: &mut ElectronSet,
        elapsed: f64,
    ) {
        self.plan_displacements(circuit, frame, electrons.density(), elapsed);

        self.counts.clear();
        for branch in circuit.branches() {
            self.counts.insert(branch.id, electrons.count_on(branch.id));
        }

        self.handles.clear();
        self.handles.extend(electrons.pool().iter().map(|(h, _)| h));

        for i in 0..self.handles.len() {
            let handle = self.handles[i];
            let Some(&electron) = electrons.pool().get(handle) else {
                continue;
            };
            let Some(branch) = circuit.branch(electron.branch) else {
                let dropped = electrons.remove_branch(electron.branch);
                log::trace!(
                    "dropped {} carriers on vanished branch {}",
                    dropped,
                    electron.branch
                );
                continue;
            };
            self.advance(circuit, electrons, handle, branch, electron.distance);
        }

        self.correct_density(circuit, electrons);
    }

    fn plan_displacements(
        &mut self,
        circuit: &Circuit,
        frame: &DynamicSolution,
        density: f64,
        elapsed: f64,
    ) {
        self.displacement.clear();
        let sign = self.mode.sign();
        let mut largest: f64 = 0.0;

        for branch in circuit.branches() {
            let current = frame.time_average(Probe::BranchCurrent(branch.id));
            let d = sign * current * self.speed_scale * elapsed;
            largest = largest.max(d.abs());
            self.displacement.insert(branch.id, d);
        }

        if density > 0.0 && largest > 0.0 {
            let limit = self.max_step_fraction / density;
            if largest > limit {
                let scale = limit / largest;
                for d in self.displacement.values_mut() {
                    *d *= scale;
                }
            }
        }
    }

    fn advance(
        &mut self,
        circuit: &Circuit,
        electrons: &mut ElectronSet,
        handle: Handle<Electron>,
        start_branch: &Branch,
        distance: f64,
    ) {
        let mut branch = start_branch;
        let mut position = distance + self.displacement(branch.id);

        for _ in 0..MAX_HOPS {
            if (0.0..=branch.length).contains(&position) {
                break;
            }
            let (junction, overflow) = if position > branch.length {
                (branch.end(), position - branch.length)
            } else {
                (branch.start(), -position)
            };

            match self.next_branch(circuit, junction, branch.id) {
                Some(next) => {
                    // Entering at the start runs forward, at the end backward
                    position = if next.start() == junction {
                        overflow
                    } else {
                        next.length - overflow
                    };
                    self.move_count(branch.id, next.id);
                    branch = next;
                }
                None => {
                    position = if junction == branch.end() {
                        branch.length
                    } else {
                        0.0
                    };
                    break;
                }
            }
        }

        let position = position.clamp(0.0, branch.length);
        if branch.id == start_branch.id {
            if let Some(e) = electrons.pool_mut().get_mut(handle) {
                e.distance = position;
            }
        } else {
            electrons.reassign(handle, branch.id, position);
        }
    }

    /// Pick the branch leaving `junction` in the flow direction.
    ///
    /// Lowest carrier density wins; ties go to the larger current, then to
    /// branch order.
    fn next_branch<'c>(
        &self,
        circuit: &'c Circuit,
        junction: NodeId,
        from: BranchId,
    ) -> Option<&'c Branch> {
        let mut best: Option<(&Branch, f64, f64)> = None;

        for candidate in circuit.branches_at(junction) {
            if candidate.id == from || candidate.is_self_loop() {
                continue;
            }
            let d = self.displacement(candidate.id);
            let leaves = (candidate.start() == junction && d > 0.0)
                || (candidate.end() == junction && d < 0.0);
            if !leaves {
                continue;
            }

            let count = self.counts.get(&candidate.id).copied().unwrap_or(0);
            let density = count as f64 / candidate.length;
            let better = match best {
                None => true,
                Some((_, best_density, best_flow)) => {
                    density < best_density || (density == best_density && d.abs() > best_flow)
                }
            };
            if better {
                best = Some((candidate, density, d.abs()));
            }
        }

        best.map(|(b, _, _)| b)
    }

    fn move_count(&mut self, from: BranchId, to: BranchId) {
        if let Some(c) = self.counts.get_mut(&from) {
            *c = c.saturating_sub(1);
        }
        *self.counts.entry(to).or_insert(0) += 1;
    }

    fn correct_density(&self, circuit: &Circuit, electrons: &mut ElectronSet) {
        for branch in circuit.branches() {
            let count = electrons.count_on(branch.id);
            let target = electrons.target_count(branch.length);
            let band = (self.tolerance * target as f64).max(1.0);

            if !electrons.has_group(branch.id) || (count as f64 - target as f64).abs() > band {
                log::trace!(
                    "re-laying out {}: {} carriers, target {}",
                    branch.name,
                    count,
                    target
                );
                electrons.layout_branch(branch);
            }
        }
    }
}
