//! Frame-level sub-stepping.
//!
//! [`DynamicStepper`] splits a frame's elapsed time into sub-steps no longer
//! than `max_substep`, re-derives companion models from the latest storage
//! state before each solve, and records every `(MnaSolution, dt)` pair in a
//! [`DynamicSolution`].

use std::mem;

use super::companion::companion_models;
use super::equation::MnaArena;
use super::linear::MnaCircuitSolver;
use super::mna::{MnaCircuit, MnaScratch};
use super::pool::{Handle, OwnerAllocator, OwnerId, Pool};
use super::solution::{BranchReading, MnaSolution};
use super::simulator::SimulatorConfig;
use crate::circuit::{Circuit, Probe};
use crate::components::Component;
use crate::error::{Result, VoltaicError};

/// The sub-step solutions of one frame.
///
/// Solutions are pooled. Each frame runs under its own owner, and starting a
/// new frame releases everything the previous one recorded.
#[derive(Debug)]
pub struct DynamicSolution {
    pool: Pool<MnaSolution>,
    owners: OwnerAllocator,
    owner: OwnerId,
    steps: Vec<(Handle<MnaSolution>, f64)>,
}

impl Default for DynamicSolution {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicSolution {
    pub fn new() -> Self {
        let mut owners = OwnerAllocator::new();
        let owner = owners.allocate();
        Self {
            pool: Pool::new(),
            owners,
            owner,
            steps: Vec::new(),
        }
    }

    /// Release the previous frame's solutions and start an empty frame.
    pub fn begin_frame(&mut self) {
        self.pool.destroy_all_owned_by(self.owner);
        let balance = self.pool.retire_owner(self.owner);
        if let Err(e) = &balance {
            log::error!("{}", e);
        }
        debug_assert!(balance.is_ok());

        self.steps.clear();
        self.owner = self.owners.allocate();
    }

    /// Record a sub-step of length `dt`, filling a recycled solution.
    pub fn record<R>(&mut self, dt: f64, fill: impl FnOnce(&mut MnaSolution) -> R) -> R {
        let (handle, solution) = self.pool.acquire_mut(self.owner);
        self.steps.push((handle, dt));
        fill(solution)
    }

    /// Number of recorded sub-steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of recorded sub-step lengths.
    pub fn total_time(&self) -> f64 {
        self.steps.iter().map(|(_, dt)| dt).sum()
    }

    /// Sub-step solutions in time order, with their lengths.
    pub fn steps(&self) -> impl Iterator<Item = (&MnaSolution, f64)> + '_ {
        self.steps
            .iter()
            .filter_map(|&(h, dt)| self.pool.get(h).map(|s| (s, dt)))
    }

    /// The most recent sub-step's solution.
    pub fn latest(&self) -> Option<&MnaSolution> {
        self.steps.last().and_then(|&(h, _)| self.pool.get(h))
    }

    /// Value of `probe` in the latest sub-step; zero for an empty frame.
    pub fn instantaneous(&self, probe: Probe) -> f64 {
        self.latest().map(|s| s.value(probe)).unwrap_or(0.0)
    }

    /// Time-weighted mean of `probe` over the frame; zero for an empty frame.
    pub fn time_average(&self, probe: Probe) -> f64 {
        let total = self.total_time();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self.steps().map(|(s, dt)| s.value(probe) * dt).sum();
        weighted / total
    }

    /// Smallest and largest per-sub-step value of `probe`.
    pub fn range(&self, probe: Probe) -> Option<(f64, f64)> {
        self.steps().map(|(s, _)| s.value(probe)).fold(None, |acc, v| {
            Some(match acc {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            })
        })
    }

    /// Number of sub-steps with at least one singular island.
    pub fn singular_substeps(&self) -> usize {
        self.steps().filter(|(s, _)| s.singular_islands() > 0).count()
    }

    /// Solutions currently held in the pool.
    pub fn live_solutions(&self) -> usize {
        self.pool.live_count()
    }
}

/// Drives companion rebuild, assembly and solve across a frame.
#[derive(Debug)]
pub struct DynamicStepper {
    max_substep: f64,
    max_substeps: usize,
    arena: MnaArena,
    solver: MnaCircuitSolver,
    scratch: MnaScratch,
}

impl DynamicStepper {
    /// Create a stepper.
    pub fn new(max_substep: f64, max_substeps: usize, singular_epsilon: f64) -> Result<Self> {
        if !(max_substep.is_finite() && max_substep > 0.0) {
            return Err(VoltaicError::invalid_simulation_param(format!(
                "max_substep must be positive, got {}",
                max_substep
            )));
        }
        if max_substeps == 0 {
            return Err(VoltaicError::invalid_simulation_param(
                "max_substeps must be at least 1",
            ));
        }
        Ok(Self {
            max_substep,
            max_substeps,
            arena: MnaArena::new(),
            solver: MnaCircuitSolver::new(singular_epsilon),
            scratch: MnaScratch::new(),
        })
    }

    pub fn from_config(config: &SimulatorConfig) -> Result<Self> {
        Self::new(
            config.max_substep,
            config.max_substeps,
            config.singular_epsilon,
        )
    }

    pub fn max_substep(&self) -> f64 {
        self.max_substep
    }

    pub fn max_substeps(&self) -> usize {
        self.max_substeps
    }

    /// Split `elapsed` into `(count, nominal dt, effective total)`.
    ///
    /// Frames longer than `max_substep * max_substeps` are clamped.
    pub fn plan(&self, elapsed: f64) -> Result<(usize, f64, f64)> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(VoltaicError::invalid_simulation_param(format!(
                "elapsed time must be finite and non-negative, got {}",
                elapsed
            )));
        }
        if elapsed == 0.0 {
            return Ok((0, 0.0, 0.0));
        }

        let limit = self.max_substep * self.max_substeps as f64;
        let total = if elapsed > limit {
            log::debug!("frame of {}s clamped to {}s", elapsed, limit);
            limit
        } else {
            elapsed
        };

        let count = ((total / self.max_substep).ceil() as usize).clamp(1, self.max_substeps);
        Ok((count, total / count as f64, total))
    }

    /// Run one frame, recording every sub-step into `frame`.
    ///
    /// Storage elements in `circuit` are advanced to the end of the frame.
    pub fn step(
        &mut self,
        circuit: &mut Circuit,
        elapsed: f64,
        frame: &mut DynamicSolution,
    ) -> Result<()> {
        let (count, dt, total) = self.plan(elapsed)?;
        frame.begin_frame();

        let mut consumed = 0.0;
        for k in 0..count {
            // Last sub-step absorbs rounding so the lengths sum to `total`
            let dt_k = if k + 1 == count { total - consumed } else { dt };
            consumed += dt_k;

            let mut scratch = mem::take(&mut self.scratch);
            companion_models(circuit, dt_k, &mut scratch.companions);

            let mna = MnaCircuit::with_scratch(&mut self.arena, circuit.node_count(), scratch)?;
            let solver = &mut self.solver;
            let singular = frame.record(dt_k, |solution| {
                let singular = solver.solve_into(&mna, solution);
                record_inactive(circuit, solution);
                singular
            });
            self.scratch = mna.finish();

            log::trace!(
                "sub-step {}/{}: dt = {:e}, {} singular islands",
                k + 1,
                count,
                dt_k,
                singular
            );

            if let Some(solution) = frame.latest() {
                update_storage(circuit, solution);
            }
        }

        Ok(())
    }
}

/// Give branches that were not solved (open switches) a zero-current reading.
fn record_inactive(circuit: &Circuit, solution: &mut MnaSolution) {
    for branch in circuit.branches() {
        if solution.contains_branch(branch.id) {
            continue;
        }
        let (a, b) = (branch.start(), branch.end());
        solution.insert_branch(
            branch.id,
            BranchReading {
                current: 0.0,
                voltage: solution.node_voltage(a) - solution.node_voltage(b),
                defined: solution.is_node_defined(a) && solution.is_node_defined(b),
            },
        );
    }
}

fn update_storage(circuit: &mut Circuit, solution: &MnaSolution) {
    for branch in circuit.branches_mut() {
        let Some(reading) = solution.branch(branch.id).filter(|r| r.defined) else {
            continue;
        };
        match &mut branch.component {
            Component::Capacitor(c) => c.update_state(reading.voltage, reading.current),
            Component::Inductor(l) => l.update_state(reading.voltage, reading.current),
            _ => {}
        }
    }
}
