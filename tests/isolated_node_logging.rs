//! Warnings about disconnected nodes are raised once, at edit time.
//!
//! Lives in its own test binary because it installs a global logger.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use voltaic_core::{Simulator, SimulatorConfig};

struct WarnCounter {
    warnings: AtomicUsize,
}

impl Log for WarnCounter {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Warn {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush(&self) {}
}

static COUNTER: WarnCounter = WarnCounter {
    warnings: AtomicUsize::new(0),
};

#[test]
fn test_removed_branch_node_warned_once() {
    log::set_logger(&COUNTER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let mut sim = Simulator::from_netlist(
        "B1 0 a 12\nR1 a 0 4\nR2 a x 4\nR3 x 0 4\n",
        SimulatorConfig::default(),
    )
    .unwrap();
    assert_eq!(COUNTER.warnings.load(Ordering::SeqCst), 0);

    for name in ["R2", "R3"] {
        let id = sim.circuit().find_branch(name).unwrap().id;
        sim.remove_branch(id).unwrap();
    }
    assert_eq!(COUNTER.warnings.load(Ordering::SeqCst), 1);

    for _ in 0..60 {
        sim.step(1.0 / 60.0).unwrap();
    }
    assert_eq!(sim.circuit().node_count(), 3);
    assert_eq!(COUNTER.warnings.load(Ordering::SeqCst), 1);
    assert!(!sim
        .frame()
        .latest()
        .unwrap()
        .is_node_defined(sim.circuit().find_node("x").unwrap()));
}
