//! Voltaic - frame-stepped circuit solver
//!
//! Runs a netlist for a number of animation frames and prints branch
//! readings and carrier counts.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug voltaic circuit.net --frames 120 --fps 60
//! ```

use std::path::PathBuf;

use clap::Parser;
use voltaic_core::{
    circuit::{validate_circuit, Circuit},
    dsl,
    error::Result,
    Probe, Simulator, SimulatorConfig,
};

/// Frame-stepped MNA circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Number of frames to simulate
    #[arg(short = 'n', long, default_value_t = 60)]
    frames: usize,

    /// Frames per second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Carriers per unit branch length
    #[arg(short, long, default_value_t = voltaic_core::electrons::DEFAULT_CARRIER_DENSITY)]
    density: f64,

    /// Print frame-averaged rather than end-of-frame readings
    #[arg(short, long)]
    average: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Parse and build the circuit
    let ast = dsl::parse_file(&args.netlist)?;
    let circuit = Circuit::from_ast(ast)?;
    validate_circuit(&circuit)?;

    let config = SimulatorConfig::new().with_carrier_density(args.density);
    let mut sim = Simulator::with_config(circuit, config)?;
    let dt = 1.0 / args.fps;

    for frame in 0..args.frames {
        let report = sim.step(dt)?;
        println!(
            "frame {:>4}  t = {:.4}s  substeps = {}  singular = {}",
            frame, sim.time(), report.substeps, report.singular_substeps
        );

        for branch in sim.circuit().branches() {
            let read = |probe| {
                if args.average {
                    sim.time_average(probe)
                } else {
                    sim.instantaneous(probe)
                }
            };
            println!(
                "  {:<8} {:>12.6} A  {:>12.6} V  carriers = {}",
                branch.name,
                read(Probe::BranchCurrent(branch.id)),
                read(Probe::BranchVoltage(branch.id)),
                sim.electrons().count_on(branch.id)
            );
        }
    }

    Ok(())
}
