//! Main simulator interface.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::circuit::{isolated_nodes, BranchId, Circuit, NodeId, Probe};
use crate::components::Component;
use crate::dsl;
use crate::electrons::{
    CarrierMode, ConstantDensityPropagator, ElectronSet, DEFAULT_CARRIER_DENSITY,
    DEFAULT_DENSITY_TOLERANCE, DEFAULT_MAX_STEP_FRACTION, DEFAULT_SPEED_SCALE,
};
use crate::error::{Result, VoltaicError};

use super::dynamic::{DynamicSolution, DynamicStepper};
use super::{DEFAULT_MAX_SUBSTEP, DEFAULT_MAX_SUBSTEPS, DEFAULT_SINGULAR_EPSILON};

/// Configuration for the simulator.
///
/// Read once at construction; changing it means building a new simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Longest allowed sub-step (seconds).
    pub max_substep: f64,
    /// Most sub-steps per frame; longer frames are clamped.
    pub max_substeps: usize,
    /// Pivot magnitude below which an island is singular.
    pub singular_epsilon: f64,
    /// Target carriers per unit branch length.
    pub carrier_density: f64,
    /// Carrier speed per ampere (length units per second).
    pub speed_scale: f64,
    /// Cap on per-frame carrier motion as a fraction of carrier spacing.
    pub max_step_fraction: f64,
    /// Relative density error tolerated before a branch is re-laid out.
    pub density_tolerance: f64,
    /// Whether carriers follow conventional current or electron flow.
    pub carrier_mode: CarrierMode,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_substep: DEFAULT_MAX_SUBSTEP,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            singular_epsilon: DEFAULT_SINGULAR_EPSILON,
            carrier_density: DEFAULT_CARRIER_DENSITY,
            speed_scale: DEFAULT_SPEED_SCALE,
            max_step_fraction: DEFAULT_MAX_STEP_FRACTION,
            density_tolerance: DEFAULT_DENSITY_TOLERANCE,
            carrier_mode: CarrierMode::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the longest sub-step.
    ///
    /// Smaller values track fast RC/RL transients more closely at the cost of
    /// more solves per frame.
    pub fn with_max_substep(mut self, max_substep: f64) -> Self {
        self.max_substep = max_substep;
        self
    }

    /// Set the sub-step cap per frame.
    pub fn with_max_substeps(mut self, max_substeps: usize) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Set the singular pivot threshold.
    pub fn with_singular_epsilon(mut self, epsilon: f64) -> Self {
        self.singular_epsilon = epsilon;
        self
    }

    /// Set the target carrier density.
    pub fn with_carrier_density(mut self, density: f64) -> Self {
        self.carrier_density = density;
        self
    }

    /// Set the carrier speed per ampere.
    pub fn with_speed_scale(mut self, speed_scale: f64) -> Self {
        self.speed_scale = speed_scale;
        self
    }

    /// Set the per-frame motion cap.
    pub fn with_max_step_fraction(mut self, fraction: f64) -> Self {
        self.max_step_fraction = fraction;
        self
    }

    /// Set the density tolerance band.
    pub fn with_density_tolerance(mut self, tolerance: f64) -> Self {
        self.density_tolerance = tolerance;
        self
    }

    /// Set the carrier mode.
    pub fn with_carrier_mode(mut self, mode: CarrierMode) -> Self {
        self.carrier_mode = mode;
        self
    }

    /// Check every value is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_substep", self.max_substep),
            ("singular_epsilon", self.singular_epsilon),
            ("carrier_density", self.carrier_density),
            ("max_step_fraction", self.max_step_fraction),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(VoltaicError::invalid_simulation_param(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("speed_scale", self.speed_scale),
            ("density_tolerance", self.density_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(VoltaicError::invalid_simulation_param(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        if self.max_substeps == 0 {
            return Err(VoltaicError::invalid_simulation_param(
                "max_substeps must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Summary of one [`Simulator::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Sub-steps solved
    pub substeps: usize,
    /// Simulated time after clamping
    pub elapsed: f64,
    /// Sub-steps that had at least one singular island
    pub singular_substeps: usize,
}

/// Owns a circuit and drives it one animation frame at a time.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    circuit: Circuit,
    stepper: DynamicStepper,
    frame: DynamicSolution,
    electrons: Rc<RefCell<ElectronSet>>,
    propagator: ConstantDensityPropagator,
    time: f64,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit) -> Result<Self> {
        Self::with_config(circuit, SimulatorConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(mut circuit: Circuit, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        for node in isolated_nodes(&circuit) {
            log::warn!("node '{}' has no branches", circuit.node_name(node));
        }
        let stepper = DynamicStepper::from_config(&config)?;
        let propagator = ConstantDensityPropagator::new(
            config.speed_scale,
            config.max_step_fraction,
            config.density_tolerance,
            config.carrier_mode,
        );

        let electrons = Rc::new(RefCell::new(ElectronSet::new(config.carrier_density)));
        electrons.borrow_mut().layout_all(&circuit);
        circuit.subscribe(electrons.clone());

        Ok(Self {
            config,
            circuit,
            stepper,
            frame: DynamicSolution::new(),
            electrons,
            propagator,
            time: 0.0,
        })
    }

    /// Parse a netlist and build a simulator for it.
    pub fn from_netlist(netlist: &str, config: SimulatorConfig) -> Result<Self> {
        let circuit = Circuit::from_ast(dsl::parse(netlist)?)?;
        Self::with_config(circuit, config)
    }

    /// Advance the simulation by one frame of `elapsed` seconds.
    pub fn step(&mut self, elapsed: f64) -> Result<FrameReport> {
        self.stepper
            .step(&mut self.circuit, elapsed, &mut self.frame)?;

        let simulated = self.frame.total_time();
        self.propagator.propagate(
            &self.circuit,
            &self.frame,
            &mut self.electrons.borrow_mut(),
            simulated,
        );
        self.time += simulated;

        let report = FrameReport {
            substeps: self.frame.len(),
            elapsed: simulated,
            singular_substeps: self.frame.singular_substeps(),
        };
        if report.singular_substeps > 0 {
            log::debug!(
                "{} of {} sub-steps had singular islands",
                report.singular_substeps,
                report.substeps
            );
        }
        Ok(report)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Simulated time so far.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The last frame's sub-step solutions.
    pub fn frame(&self) -> &DynamicSolution {
        &self.frame
    }

    /// The carrier set.
    pub fn electrons(&self) -> Ref<'_, ElectronSet> {
        self.electrons.borrow()
    }

    /// `(branch, distance)` of every carrier.
    pub fn carrier_positions(&self) -> Vec<(BranchId, f64)> {
        self.electrons.borrow().positions()
    }

    /// Value of `probe` at the end of the last frame.
    pub fn instantaneous(&self, probe: Probe) -> f64 {
        self.frame.instantaneous(probe)
    }

    /// Value of `probe` averaged over the last frame.
    pub fn time_average(&self, probe: Probe) -> f64 {
        self.frame.time_average(probe)
    }

    /// Frame-averaged current through the branch called `name`.
    pub fn branch_current(&self, name: &str) -> Option<f64> {
        let branch = self.circuit.find_branch(name)?;
        Some(self.time_average(Probe::BranchCurrent(branch.id)))
    }

    /// Voltage of the node called `name` at the end of the last frame.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        let node = self.circuit.find_node(name)?;
        Some(self.instantaneous(Probe::NodeVoltage(node)))
    }

    pub fn add_node(&mut self, name: &str) -> NodeId {
        self.circuit.add_node(name)
    }

    /// Add a branch; its carriers are laid out immediately.
    pub fn add_branch(
        &mut self,
        name: &str,
        start: NodeId,
        end: NodeId,
        component: Component,
        length: f64,
    ) -> Result<BranchId> {
        self.circuit
            .add_branch_with_length(name, start, end, component, length)
    }

    /// Remove a branch and release its carriers.
    pub fn remove_branch(&mut self, id: BranchId) -> Result<()> {
        self.circuit.remove_branch(id).map(|_| ())
    }

    pub fn set_switch(&mut self, id: BranchId, closed: bool) -> Result<()> {
        self.circuit.set_switch(id, closed)
    }

    /// Resize a branch; carriers follow on the next frame.
    pub fn set_length(&mut self, id: BranchId, length: f64) -> Result<()> {
        self.circuit.set_length(id, length)
    }

    pub fn set_component(&mut self, id: BranchId, component: Component) -> Result<()> {
        self.circuit.set_component(id, component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_config_builder() {
        let config = SimulatorConfig::new()
            .with_max_substep(5e-4)
            .with_carrier_density(4.0)
            .with_carrier_mode(CarrierMode::Electrons);
        assert_eq!(config.max_substep, 5e-4);
        assert_eq!(config.carrier_density, 4.0);
        assert_eq!(config.carrier_mode, CarrierMode::Electrons);
        assert!(config.validate().is_ok());

        assert!(SimulatorConfig::new().with_max_substep(0.0).validate().is_err());
        assert!(SimulatorConfig::new().with_max_substeps(0).validate().is_err());
        assert!(SimulatorConfig::new().with_speed_scale(-1.0).validate().is_err());
    }

    #[test]
    fn test_step_reports_frame() {
        let mut sim = Simulator::from_netlist("B1 0 a 12\nR1 a 0 4\n", SimulatorConfig::default())
            .unwrap();
        let report = sim.step(1.0 / 60.0).unwrap();

        assert_eq!(report.substeps, 17);
        assert_eq!(report.singular_substeps, 0);
        assert_relative_eq!(sim.time(), 1.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(sim.branch_current("R1").unwrap(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(sim.node_voltage("a").unwrap(), 12.0, epsilon = 1e-9);
        assert!(sim.branch_current("R9").is_none());
    }

    #[test]
    fn test_edits_reach_carriers() {
        let mut sim = Simulator::from_netlist(
            "B1 0 a 12\nR1 a 0 4\n",
            SimulatorConfig::new().with_carrier_density(3.0),
        )
        .unwrap();
        assert_eq!(sim.electrons().len(), 6);

        let a = sim.circuit().find_node("a").unwrap();
        let zero = sim.circuit().find_node("0").unwrap();
        let r2 = sim
            .add_branch(
                "R2",
                a,
                zero,
                Component::Resistor(crate::components::Resistor::new(12.0)),
                2.0,
            )
            .unwrap();
        assert_eq!(sim.electrons().count_on(r2), 6);

        sim.remove_branch(r2).unwrap();
        assert_eq!(sim.electrons().count_on(r2), 0);
        assert_eq!(sim.electrons().len(), 6);
    }

    #[test]
    fn test_negative_elapsed_rejected() {
        let mut sim = Simulator::from_netlist("B1 0 a 1\nR1 a 0 1\n", SimulatorConfig::default())
            .unwrap();
        assert!(matches!(
            sim.step(-0.1),
            Err(VoltaicError::InvalidSimulationParam { .. })
        ));
    }
}
