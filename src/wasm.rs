//! WASM bindings for Voltaic Core.
//!
//! This module provides JavaScript-friendly bindings for a browser view layer
//! that calls into the solver once per `requestAnimationFrame`.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuitSim } from 'voltaic_core';
//!
//! await init();
//!
//! const sim = new WasmCircuitSim(`
//!   B1 0 a 12
//!   R1 a 0 4 len=2
//! `);
//!
//! function frame(dt) {
//!   sim.step(dt);
//!   // [branchIndex0, distance0, branchIndex1, distance1, ...]
//!   const carriers = sim.carrier_positions();
//! }
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::Circuit;
use crate::dsl;
use crate::solver::{Simulator, SimulatorConfig};

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// WASM-compatible frame-stepped circuit simulator.
#[wasm_bindgen]
pub struct WasmCircuitSim {
    simulator: Simulator,
}

#[wasm_bindgen]
impl WasmCircuitSim {
    /// Create a new simulator from a netlist string with default settings.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist: &str) -> Result<WasmCircuitSim, JsValue> {
        Self::with_config(netlist, crate::electrons::DEFAULT_CARRIER_DENSITY, 1e-3)
    }

    /// Create a new simulator with a carrier density and maximum sub-step.
    #[wasm_bindgen]
    pub fn with_config(
        netlist: &str,
        carrier_density: f64,
        max_substep: f64,
    ) -> Result<WasmCircuitSim, JsValue> {
        let ast = dsl::parse(netlist).map_err(js_error)?;
        let circuit = Circuit::from_ast(ast).map_err(js_error)?;
        crate::circuit::validate_circuit(&circuit).map_err(js_error)?;

        let config = SimulatorConfig::new()
            .with_carrier_density(carrier_density)
            .with_max_substep(max_substep);
        let simulator = Simulator::with_config(circuit, config).map_err(js_error)?;

        Ok(WasmCircuitSim { simulator })
    }

    /// Advance by one frame of `elapsed` seconds.
    ///
    /// Returns the number of sub-steps solved.
    #[wasm_bindgen]
    pub fn step(&mut self, elapsed: f64) -> Result<usize, JsValue> {
        let report = self.simulator.step(elapsed).map_err(js_error)?;
        Ok(report.substeps)
    }

    /// Frame-averaged current through a named branch, or `undefined`.
    #[wasm_bindgen]
    pub fn branch_current(&self, name: &str) -> Option<f64> {
        self.simulator.branch_current(name)
    }

    /// Voltage at a named node, or `undefined`.
    #[wasm_bindgen]
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        self.simulator.node_voltage(name)
    }

    /// Open or close a named switch.
    #[wasm_bindgen]
    pub fn set_switch(&mut self, name: &str, closed: bool) -> Result<(), JsValue> {
        let id = self
            .simulator
            .circuit()
            .find_branch(name)
            .map(|b| b.id)
            .ok_or_else(|| js_error(format!("no branch named '{}'", name)))?;
        self.simulator.set_switch(id, closed).map_err(js_error)
    }

    /// Carrier positions as a flat `[branch_index, distance, ...]` array.
    ///
    /// `branch_index` is the branch's position in netlist order.
    #[wasm_bindgen]
    pub fn carrier_positions(&self) -> Vec<f64> {
        let branches = self.simulator.circuit().branches();
        let mut out = Vec::with_capacity(self.simulator.electrons().len() * 2);
        for (branch, distance) in self.simulator.carrier_positions() {
            if let Some(index) = branches.iter().position(|b| b.id == branch) {
                out.push(index as f64);
                out.push(distance);
            }
        }
        out
    }

    /// Simulated time so far.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.simulator.time()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
