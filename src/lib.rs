//! # mnasim
//!
//! A lumped-element circuit simulator built on Modified Nodal Analysis.
//!
//! This library provides:
//! - A SPICE-inspired netlist language for describing circuits
//! - A stamp-once MNA system with a dense LU solver
//! - Linear devices (R, C, voltage and function sources, probes) and
//!   nonlinear semiconductors (diodes, Ebers-Moll BJTs)
//! - DC operating point and fixed-step trapezoidal transient analysis
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`circuit`] - Core types, netlist construction and validation
//! - [`components`] - Device models and their matrix stamps
//! - [`solver`] - MNA system, LU factorization, Newton-Raphson and the
//!   [`Netlist`] simulation driver
//! - `report` - Tabular output for the CLI
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! mnasim rc.cir --step 10u --ticks 500 > rc.tsv
//! ```
//!
//! ### Library
//!
//! ```
//! use mnasim::components::{Resistor, VoltageSource};
//! use mnasim::circuit::Net;
//! use mnasim::Netlist;
//!
//! let mut netlist = Netlist::new(3);
//! netlist.add(VoltageSource::new(12.0, Net(1), Net(0)).unwrap()).unwrap();
//! netlist.add(Resistor::new(200e3, Net(1), Net(2)).unwrap()).unwrap();
//! netlist.add(Resistor::new(100e3, Net(2), Net(0)).unwrap()).unwrap();
//! netlist.finalize().unwrap();
//!
//! let report = netlist.step().unwrap();
//! assert!(report.is_converged());
//! assert!((netlist.solution(Net(2)).unwrap() - 4.0).abs() < 1e-9);
//! ```
//!
//! ## Simulation Method
//!
//! Every device writes its contribution into the system matrix once, when
//! the netlist is finalized. Entries that change during a run are bound to
//! live values that devices update in place. For each step:
//!
//! 1. Sources are evaluated at the target time
//! 2. The matrix is refreshed from its static, timed and live parts
//! 3. Ax = b is solved by LU factorization
//! 4. Nonlinear devices relinearize until every one of them accepts the
//!    solution (Newton-Raphson)
//!
//! Capacitors are discretized with the trapezoidal rule.

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod error;
pub mod solver;

#[cfg(feature = "cli")]
pub mod report;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use solver::{Netlist, SolverConfig, StepOutcome, StepReport};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmNetlistSim;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.026;
