//! Dense LU solving of assembled MNA systems.

use super::companion::CompanionKind;
use super::equation::Unknown;
use super::mna::{Island, MnaCircuit};
use super::solution::MnaSolution;
use super::DEFAULT_SINGULAR_EPSILON;
use crate::circuit::NodeId;
use crate::error::{Result, VoltaicError};

/// A square system `A x = z` for one island.
///
/// Factored in place: after [`factor`](DenseSystem::factor) the matrix holds
/// L below the diagonal (unit diagonal implied) and U on and above it.
/// Buffers keep their capacity between islands and sub-steps.
#[derive(Debug, Default)]
pub struct DenseSystem {
    size: usize,
    matrix: Vec<f64>,
    rhs: Vec<f64>,
    solution: Vec<f64>,
    perm: Vec<usize>,
}

impl DenseSystem {
    pub fn new(size: usize) -> Self {
        let mut system = Self::default();
        system.resize(size);
        system
    }

    /// Zero the system at dimension `size`.
    pub fn resize(&mut self, size: usize) {
        self.size = size;
        self.matrix.clear();
        self.matrix.resize(size * size, 0.0);
        self.rhs.clear();
        self.rhs.resize(size, 0.0);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[row * self.size + col]
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.matrix[row * self.size + col] += value;
    }

    pub fn add_source(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }

    /// Partial-pivoting LU. A column whose largest candidate pivot is below
    /// `epsilon` (or NaN) makes the system singular.
    pub fn factor(&mut self, epsilon: f64) -> Result<()> {
        let n = self.size;
        self.perm.clear();
        self.perm.extend(0..n);

        for col in 0..n {
            let (pivot_row, magnitude) = (col..n)
                .map(|r| (r, self.matrix[r * n + col].abs()))
                .fold((col, f64::NAN), |best, cand| {
                    if best.1.is_nan() || cand.1 > best.1 {
                        cand
                    } else {
                        best
                    }
                });
            if magnitude.is_nan() || magnitude < epsilon {
                return Err(VoltaicError::SingularSystem { island_size: n });
            }

            if pivot_row != col {
                for j in 0..n {
                    self.matrix.swap(col * n + j, pivot_row * n + j);
                }
                self.perm.swap(col, pivot_row);
            }

            let (upper, lower) = self.matrix.split_at_mut((col + 1) * n);
            let pivot = &upper[col * n..];
            for row in lower.chunks_exact_mut(n) {
                let factor = row[col] / pivot[col];
                row[col] = factor;
                if factor != 0.0 {
                    for j in (col + 1)..n {
                        row[j] -= factor * pivot[j];
                    }
                }
            }
        }

        Ok(())
    }

    /// Forward and back substitution against the last factorization.
    pub fn solve(&mut self) -> &[f64] {
        let n = self.size;
        let lu = &self.matrix;
        let x = &mut self.solution;

        x.clear();
        x.extend(self.perm.iter().map(|&p| self.rhs[p]));

        for i in 0..n {
            let row = &lu[i * n..(i + 1) * n];
            let dot: f64 = (0..i).map(|j| row[j] * x[j]).sum();
            x[i] -= dot;
        }
        for i in (0..n).rev() {
            let row = &lu[i * n..(i + 1) * n];
            let dot: f64 = ((i + 1)..n).map(|j| row[j] * x[j]).sum();
            x[i] = (x[i] - dot) / row[i];
        }

        x
    }
}

/// Solves assembled circuits island by island.
#[derive(Debug)]
pub struct MnaCircuitSolver {
    system: DenseSystem,
    epsilon: f64,
}

impl Default for MnaCircuitSolver {
    fn default() -> Self {
        Self::new(DEFAULT_SINGULAR_EPSILON)
    }
}

impl MnaCircuitSolver {
    /// Create a solver with the given singular-pivot threshold.
    pub fn new(epsilon: f64) -> Self {
        Self {
            system: DenseSystem::default(),
            epsilon,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Solve every island, failing on the first singular one.
    pub fn solve(&mut self, circuit: &MnaCircuit<'_>) -> Result<MnaSolution> {
        let mut solution = MnaSolution::new(circuit.node_count());
        for island in circuit.islands() {
            self.solve_island(circuit, island, &mut solution)?;
        }
        record_self_loops(circuit, &mut solution);
        Ok(solution)
    }

    /// Solve every island into `out`, zeroing singular islands instead of
    /// failing. Returns the number of singular islands.
    pub fn solve_into(&mut self, circuit: &MnaCircuit<'_>, out: &mut MnaSolution) -> usize {
        out.reset(circuit.node_count());
        for island in circuit.islands() {
            if let Err(e) = self.solve_island(circuit, island, out) {
                log::debug!("{}; island at {} reads as zero", e, island.ground);
                degrade_island(circuit, island, out);
                out.mark_singular();
            }
        }
        record_self_loops(circuit, out);
        out.singular_islands()
    }

    fn solve_island(
        &mut self,
        circuit: &MnaCircuit<'_>,
        island: &Island,
        out: &mut MnaSolution,
    ) -> Result<()> {
        let arena = circuit.arena();
        let size = island.size();
        self.system.resize(size);

        for (row, &eq) in island.equations.iter().enumerate() {
            for term in arena.terms_of(eq) {
                if let Some(col) = island.unknown_index(term.unknown) {
                    self.system.add(row, col, term.coefficient);
                }
            }
            if let Some(eq) = arena.equations.get(eq) {
                self.system.add_source(row, eq.rhs);
            }
        }

        self.system
            .factor(self.epsilon)
            .map_err(|_| VoltaicError::SingularSystem {
                island_size: island.nodes.len(),
            })?;
        let x = self.system.solve();

        let value = |unknown: Unknown| island.unknown_index(unknown).map(|i| x[i]).unwrap_or(0.0);
        let voltage = |node: NodeId| value(Unknown::Voltage(node));

        for &node in &island.nodes {
            out.set_node_voltage(node, voltage(node));
        }

        for &i in &island.companions {
            let model = &circuit.companions()[i];
            let v = voltage(model.start()) - voltage(model.end());
            let current = match model.kind {
                CompanionKind::Resistor(r) => v / r,
                CompanionKind::Battery(_) => value(Unknown::Current(model.branch)),
                CompanionKind::CurrentSource(j) => j,
            };
            out.accumulate(model.branch, current, v, true);
        }

        Ok(())
    }
}

fn degrade_island(circuit: &MnaCircuit<'_>, island: &Island, out: &mut MnaSolution) {
    for &i in &island.companions {
        out.accumulate(circuit.companions()[i].branch, 0.0, 0.0, false);
    }
}

/// Self-loops are left out of the islands; they carry no current and no
/// voltage.
fn record_self_loops(circuit: &MnaCircuit<'_>, out: &mut MnaSolution) {
    for model in circuit.companions().iter().filter(|m| m.is_self_loop()) {
        let defined = out.is_node_defined(model.start());
        out.accumulate(model.branch, 0.0, 0.0, defined);
    }
}
