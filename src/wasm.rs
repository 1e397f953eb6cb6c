//! WASM bindings for mnasim.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmNetlistSim } from 'mnasim';
//!
//! await init();
//!
//! const sim = new WasmNetlistSim(`
//!   FIN in  0   STEP(0 1)
//!   R1  in  out 1k
//!   C1  out 0   1u
//! `);
//!
//! sim.dc_operating_point();
//! sim.set_time_step(1e-5);
//! for (let i = 0; i < 500; i++) {
//!   const values = sim.step(); // Float64Array, one entry per net
//! }
//! console.log(sim.node_voltage("out"));
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::{validate_circuit, Circuit};
use crate::error::SimError;

fn to_js(e: SimError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// WASM-compatible circuit simulator.
///
/// Wraps a finalized [`Circuit`]; every failed step is thrown as a
/// JavaScript error carrying the error message.
#[wasm_bindgen]
pub struct WasmNetlistSim {
    circuit: Circuit,
}

#[wasm_bindgen]
impl WasmNetlistSim {
    /// Parse, validate and finalize a netlist.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist: &str) -> Result<WasmNetlistSim, JsValue> {
        let mut circuit = Circuit::from_source(netlist).map_err(to_js)?;
        validate_circuit(&circuit).map_err(to_js)?;
        circuit.netlist.finalize().map_err(to_js)?;
        Ok(WasmNetlistSim { circuit })
    }

    /// Solve the DC operating point. Only meaningful before the first
    /// call to `set_time_step`.
    #[wasm_bindgen]
    pub fn dc_operating_point(&mut self) -> Result<Vec<f64>, JsValue> {
        self.step()
    }

    /// Switch to transient analysis with the given step in seconds.
    #[wasm_bindgen]
    pub fn set_time_step(&mut self, dt: f64) -> Result<(), JsValue> {
        self.circuit.netlist.set_time_step(dt).map_err(to_js)
    }

    /// Advance one step, returning the display value of every net.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<Vec<f64>, JsValue> {
        let report = self.circuit.netlist.step().map_err(to_js)?;
        Ok(report.into_result().map_err(to_js)?.values)
    }

    /// Simulation time of the last converged step.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.circuit.netlist.time()
    }

    /// Get the current voltage at a named node.
    ///
    /// Returns `undefined` if the node doesn't exist.
    #[wasm_bindgen]
    pub fn node_voltage(&self, node_name: &str) -> Option<f64> {
        let net = self.circuit.find_node(node_name)?;
        self.circuit.netlist.solution(net).ok()
    }

    /// Display names of every net, in the order `step` returns them.
    #[wasm_bindgen]
    pub fn net_names(&self) -> Result<Vec<String>, JsValue> {
        self.circuit.netlist.net_names().map_err(to_js)
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
