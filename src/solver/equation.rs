//! Linear algebra vocabulary: unknowns, terms and equations.

use std::fmt;

use super::pool::{Handle, OwnerAllocator, OwnerId, Pool, Recycle};
use crate::circuit::{BranchId, NodeId};
use crate::error::{Result, VoltaicError};

/// A scalar unknown of the MNA system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unknown {
    /// Node voltage relative to the island's reference node
    Voltage(NodeId),
    /// Current through a battery-like branch, start to end
    Current(BranchId),
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unknown::Voltage(n) => write!(f, "V({})", n),
            Unknown::Current(b) => write!(f, "I({})", b),
        }
    }
}

/// `coefficient * unknown`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub unknown: Unknown,
}

impl Term {
    pub fn new(coefficient: f64, unknown: Unknown) -> Self {
        Self {
            coefficient,
            unknown,
        }
    }
}

impl Default for Term {
    fn default() -> Self {
        Self::new(0.0, Unknown::Voltage(NodeId(0)))
    }
}

impl Recycle for Term {
    fn recycle(&mut self) {
        *self = Self::default();
    }
}

/// What an equation expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationKind {
    /// Sum of currents leaving a node is zero
    Kcl(NodeId),
    /// `V(end) - V(start) = voltage` for a battery-like branch
    Definition(BranchId),
}

/// Sum of terms equal to a right-hand side constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub kind: EquationKind,
    pub terms: Vec<Handle<Term>>,
    pub rhs: f64,
}

impl Default for Equation {
    fn default() -> Self {
        Self {
            kind: EquationKind::Kcl(NodeId(0)),
            terms: Vec::new(),
            rhs: 0.0,
        }
    }
}

impl Recycle for Equation {
    fn recycle(&mut self) {
        self.kind = EquationKind::Kcl(NodeId(0));
        self.terms.clear();
        self.rhs = 0.0;
    }
}

/// Pools for the objects an assembly creates each sub-step.
///
/// One arena lives as long as the stepper; each assembly borrows it under a
/// fresh owner and gives everything back when it is dropped.
#[derive(Debug, Default)]
pub struct MnaArena {
    pub terms: Pool<Term>,
    pub equations: Pool<Equation>,
    owners: OwnerAllocator,
}

impl MnaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an owner for a new assembly.
    pub fn allocate_owner(&mut self) -> OwnerId {
        self.owners.allocate()
    }

    /// Create an empty equation.
    pub fn add_equation(&mut self, owner: OwnerId, kind: EquationKind) -> Handle<Equation> {
        let handle = self.equations.acquire(owner);
        if let Some(eq) = self.equations.get_mut(handle) {
            eq.kind = kind;
        }
        handle
    }

    /// Append `coefficient * unknown` to an equation.
    pub fn add_term(
        &mut self,
        owner: OwnerId,
        equation: Handle<Equation>,
        coefficient: f64,
        unknown: Unknown,
    ) -> Result<()> {
        let term = self.terms.create(owner, Term::new(coefficient, unknown));
        match self.equations.get_mut(equation) {
            Some(eq) => {
                eq.terms.push(term);
                Ok(())
            }
            None => {
                self.terms.destroy(term)?;
                Err(VoltaicError::StaleHandle {
                    index: equation.index(),
                    generation: equation.generation(),
                })
            }
        }
    }

    /// Add to an equation's right-hand side.
    pub fn add_rhs(&mut self, equation: Handle<Equation>, value: f64) {
        if let Some(eq) = self.equations.get_mut(equation) {
            eq.rhs += value;
        }
    }

    /// Terms of an equation, in insertion order.
    pub fn terms_of(&self, equation: Handle<Equation>) -> impl Iterator<Item = &Term> + '_ {
        self.equations
            .get(equation)
            .into_iter()
            .flat_map(|eq| eq.terms.iter())
            .filter_map(|&t| self.terms.get(t))
    }

    /// `lhs - rhs` of an equation for the given unknown values.
    pub fn residual(&self, equation: Handle<Equation>, value: impl Fn(Unknown) -> f64) -> f64 {
        let lhs: f64 = self
            .terms_of(equation)
            .map(|t| t.coefficient * value(t.unknown))
            .sum();
        let rhs = self.equations.get(equation).map(|eq| eq.rhs).unwrap_or(0.0);
        lhs - rhs
    }

    /// Release everything `owner` created in both pools.
    pub fn release(&mut self, owner: OwnerId) -> usize {
        self.equations.destroy_all_owned_by(owner) + self.terms.destroy_all_owned_by(owner)
    }

    /// Confirm `owner` holds nothing in either pool.
    pub fn retire(&self, owner: OwnerId) -> Result<()> {
        self.equations.retire_owner(owner)?;
        self.terms.retire_owner(owner)
    }
}
