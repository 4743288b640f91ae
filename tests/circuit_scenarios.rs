//! End-to-end circuit scenarios driven through the public simulator API.

use approx::assert_relative_eq;
use voltaic_core::circuit::{Circuit, NodeId};
use voltaic_core::components::{Component, Resistor};
use voltaic_core::solver::{DynamicSolution, DynamicStepper, MnaSolution};
use voltaic_core::{dsl, Probe, Simulator, SimulatorConfig, VoltaicError};

const FRAME: f64 = 1.0 / 60.0;

fn simulator(netlist: &str, config: SimulatorConfig) -> Simulator {
    Simulator::from_netlist(netlist, config).unwrap()
}

fn node(sim: &Simulator, name: &str) -> NodeId {
    sim.circuit().find_node(name).unwrap()
}

/// Net current leaving `node` in `solution`.
fn net_outflow(circuit: &Circuit, solution: &MnaSolution, node: NodeId) -> f64 {
    circuit
        .branches_at(node)
        .filter(|b| !b.is_self_loop())
        .map(|b| {
            let i = solution.branch_current(b.id);
            if b.start() == node {
                i
            } else {
                -i
            }
        })
        .sum()
}

#[test]
fn test_battery_resistor_loop() {
    let mut sim = simulator(
        "B1 0 a 12\nR1 a 0 4\n",
        SimulatorConfig::new().with_carrier_density(1.0),
    );
    let r1 = sim.circuit().find_branch("R1").unwrap().id;
    let b1 = sim.circuit().find_branch("B1").unwrap().id;

    sim.step(FRAME).unwrap();

    assert_relative_eq!(sim.instantaneous(Probe::BranchCurrent(r1)), 3.0, epsilon = 1e-9);
    assert_relative_eq!(sim.instantaneous(Probe::BranchCurrent(b1)), 3.0, epsilon = 1e-9);
    assert_relative_eq!(sim.node_voltage("0").unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(sim.node_voltage("a").unwrap(), 12.0, epsilon = 1e-9);
    assert_relative_eq!(sim.instantaneous(Probe::BranchVoltage(r1)), 12.0, epsilon = 1e-9);

    // One carrier per branch, starting mid-branch, moved 3 A * 1/60 s forward
    let distances: Vec<f64> = sim.electrons().iter_on(r1).map(|e| e.distance).collect();
    assert_eq!(distances.len(), 1);
    assert_relative_eq!(distances[0], 0.5 + 3.0 * FRAME, epsilon = 1e-9);
}

#[test]
fn test_voltage_divider() {
    let mut sim = simulator(
        "B1 0 top 10\nR1 top mid 1000\nR2 mid 0 3000\n",
        SimulatorConfig::default(),
    );
    sim.step(FRAME).unwrap();

    assert_relative_eq!(sim.node_voltage("mid").unwrap(), 7.5, epsilon = 1e-9);
    assert_relative_eq!(sim.branch_current("R1").unwrap(), 2.5e-3, epsilon = 1e-12);
    assert_relative_eq!(sim.branch_current("R2").unwrap(), 2.5e-3, epsilon = 1e-12);
}

fn rc_error(max_substep: f64) -> f64 {
    // RC = 1 s
    let mut sim = simulator(
        "B1 0 a 5\nR1 a b 1k\nC1 b 0 1m\n",
        SimulatorConfig::new()
            .with_max_substep(max_substep)
            .with_max_substeps(1000),
    );
    for _ in 0..60 {
        sim.step(FRAME).unwrap();
    }
    let expected = 5.0 * (1.0 - (-sim.time()).exp());
    (sim.node_voltage("b").unwrap() - expected).abs()
}

#[test]
fn test_rc_charging_converges() {
    let coarse = rc_error(1e-2);
    let fine = rc_error(1e-4);

    assert!(fine < 1e-3, "fine error {}", fine);
    assert!(fine < coarse, "fine {} vs coarse {}", fine, coarse);
}

fn rl_error(max_substep: f64) -> f64 {
    // L/R = 1 s
    let mut sim = simulator(
        "B1 0 a 1\nR1 a b 1\nL1 b 0 1\n",
        SimulatorConfig::new()
            .with_max_substep(max_substep)
            .with_max_substeps(1000),
    );
    let l1 = sim.circuit().find_branch("L1").unwrap().id;
    for _ in 0..60 {
        sim.step(FRAME).unwrap();
    }
    let expected = 1.0 - (-sim.time()).exp();
    (sim.instantaneous(Probe::BranchCurrent(l1)) - expected).abs()
}

#[test]
fn test_rl_current_rise_converges() {
    let coarse = rl_error(1e-2);
    let fine = rl_error(1e-4);

    assert!(fine < 1e-3, "fine error {}", fine);
    assert!(fine < coarse, "fine {} vs coarse {}", fine, coarse);
}

#[test]
fn test_kcl_holds_at_every_node() {
    let mut sim = simulator(
        "B1 0 a 9\n\
         R1 a b 100\n\
         R2 b 0 220\n\
         C1 b 0 10u\n\
         I1 0 b 0.01\n\
         L1 a c 1m\n\
         R3 c 0 50\n\
         SW1 c b open\n",
        SimulatorConfig::default(),
    );

    for _ in 0..5 {
        sim.step(FRAME).unwrap();
        let solution = sim.frame().latest().unwrap();
        for n in 0..sim.circuit().node_count() {
            let n = NodeId(n);
            assert!(solution.is_node_defined(n));
            let outflow = net_outflow(sim.circuit(), solution, n);
            assert!(outflow.abs() < 1e-9, "node {} leaks {}", n, outflow);
        }
    }
}

#[test]
fn test_substeps_cover_the_frame() {
    let mut circuit =
        Circuit::from_ast(dsl::parse("B1 0 a 12\nR1 a b 4\nC1 b 0 1m\n").unwrap()).unwrap();
    let mut stepper = DynamicStepper::new(1e-3, 100, 1e-12).unwrap();
    let mut frame = DynamicSolution::new();

    for elapsed in [FRAME, 2.0 * FRAME, 0.05, 1e-3, 5e-4, 0.0999] {
        stepper.step(&mut circuit, elapsed, &mut frame).unwrap();
        let total: f64 = frame.steps().map(|(_, dt)| dt).sum();
        assert!((total - elapsed).abs() < 1e-9, "{} vs {}", total, elapsed);
        assert!(frame.steps().all(|(_, dt)| dt <= 1e-3 + 1e-12));
    }

    // Longer than 100 sub-steps: clamped
    stepper.step(&mut circuit, 0.5, &mut frame).unwrap();
    assert_eq!(frame.len(), 100);
    assert_relative_eq!(frame.total_time(), 0.1, epsilon = 1e-9);
}

#[test]
fn test_time_average_within_range() {
    let mut sim = simulator("B1 0 a 5\nR1 a b 100\nC1 b 0 100u\n", SimulatorConfig::default());
    sim.step(FRAME).unwrap();

    let r1 = sim.circuit().find_branch("R1").unwrap().id;
    let probe = Probe::BranchCurrent(r1);
    let (lo, hi) = sim.frame().range(probe).unwrap();
    let avg = sim.time_average(probe);

    // Charging current decays through the frame
    assert!(lo < hi);
    assert!(lo <= avg && avg <= hi);
    assert_relative_eq!(sim.instantaneous(probe), lo, epsilon = 1e-12);
}

#[test]
fn test_density_stays_in_band() {
    let config = SimulatorConfig::new().with_carrier_density(5.0);
    let tolerance = config.density_tolerance;
    let mut sim = simulator(
        "B1 0 a 12\nR1 a b 4 len=2\nR2 b 0 8\nR3 b 0 8 len=3\n",
        config,
    );

    for _ in 0..600 {
        sim.step(FRAME).unwrap();
        let electrons = sim.electrons();
        for branch in sim.circuit().branches() {
            let target = electrons.target_count(branch.length) as f64;
            let count = electrons.count_on(branch.id) as f64;
            let band = (tolerance * target).max(1.0);
            assert!(
                (count - target).abs() <= band,
                "{} holds {} carriers, target {}",
                branch.name,
                count,
                target
            );
            assert!(electrons
                .iter_on(branch.id)
                .all(|e| (0.0..=branch.length).contains(&e.distance)));
        }
    }
}

#[test]
fn test_singular_island_is_isolated() {
    let mut sim = simulator(
        "B1 0 a 12\nR1 a 0 4\nB2 x y 5\nB3 x y 9\n",
        SimulatorConfig::default(),
    );
    let report = sim.step(FRAME).unwrap();

    assert_eq!(report.singular_substeps, report.substeps);
    assert_relative_eq!(sim.branch_current("R1").unwrap(), 3.0, epsilon = 1e-9);
    assert_relative_eq!(sim.branch_current("B2").unwrap(), 0.0);

    let b2 = sim.circuit().find_branch("B2").unwrap().id;
    let latest = sim.frame().latest().unwrap();
    assert!(!latest.is_branch_defined(b2));
    assert!(!latest.is_node_defined(node(&sim, "x")));
    assert!(latest.is_node_defined(node(&sim, "a")));
}

#[test]
fn test_switch_toggles_loop() {
    let mut sim = simulator("B1 0 a 12\nSW1 a b open\nR1 b 0 4\n", SimulatorConfig::default());
    let sw = sim.circuit().find_branch("SW1").unwrap().id;

    sim.step(FRAME).unwrap();
    assert_relative_eq!(sim.branch_current("R1").unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(sim.instantaneous(Probe::BranchVoltage(sw)), 12.0, epsilon = 1e-9);

    sim.set_switch(sw, true).unwrap();
    sim.step(FRAME).unwrap();
    assert_relative_eq!(sim.branch_current("R1").unwrap(), 3.0, epsilon = 1e-9);
    assert_relative_eq!(sim.branch_current("SW1").unwrap(), 3.0, epsilon = 1e-9);
}

#[test]
fn test_removed_branch_drops_carriers() {
    let mut sim = simulator(
        "B1 0 a 12\nR1 a 0 4\n",
        SimulatorConfig::new().with_carrier_density(4.0),
    );
    let (a, zero) = (node(&sim, "a"), node(&sim, "0"));
    let r2 = sim
        .add_branch("R2", a, zero, Component::Resistor(Resistor::new(6.0)), 1.5)
        .unwrap();
    assert_eq!(sim.electrons().count_on(r2), 6);

    sim.step(FRAME).unwrap();
    assert_relative_eq!(sim.branch_current("B1").unwrap(), 5.0, epsilon = 1e-9);

    sim.remove_branch(r2).unwrap();
    assert_eq!(sim.electrons().count_on(r2), 0);
    assert!(sim.carrier_positions().iter().all(|&(b, _)| b != r2));

    sim.step(FRAME).unwrap();
    assert_relative_eq!(sim.branch_current("B1").unwrap(), 3.0, epsilon = 1e-9);
    assert!(matches!(
        sim.remove_branch(r2),
        Err(VoltaicError::BranchNotFound { .. })
    ));
}

#[test]
fn test_netlist_errors() {
    let config = SimulatorConfig::default();
    assert!(matches!(
        Simulator::from_netlist("D1 a 0\n", config.clone()),
        Err(VoltaicError::UnsupportedBranchType { .. })
    ));
    assert!(matches!(
        Simulator::from_netlist("R1 a 0 -4\n", config.clone()),
        Err(VoltaicError::InvalidParameter { .. })
    ));
    assert!(matches!(
        Simulator::from_netlist("B1 0 a 12\nB1 a 0 4\n", config.clone()),
        Err(VoltaicError::DuplicateBranch { .. })
    ));
    assert!(matches!(
        Simulator::from_netlist("B1 0 a 12\n", config.with_max_substep(-1.0)),
        Err(VoltaicError::InvalidSimulationParam { .. })
    ));
}
