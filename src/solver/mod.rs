//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations `A x = b` where x contains node
//! voltages plus whatever extra unknowns devices claim for themselves:
//! source branch currents, junction voltages and currents, capacitor
//! integration state. Net 0 is ground and is never solved for.
//!
//! ## Per-step flow
//!
//! The system is stamped once by [`Netlist::finalize`]. Every Newton
//! iteration of [`Netlist::step`] then only refreshes cell values from the
//! live-value table, factors a dense working copy in place and solves it,
//! and asks every device whether its linearization still holds.

mod dense;
mod mna;
mod netlist;
mod newton;

pub use dense::DenseLu;
pub use mna::{LiveId, MnaCell, MnaSystem};
pub use netlist::{Netlist, SolverConfig, StepOutcome, StepReport};
pub use newton::NewtonRaphson;

/// Newton-Raphson voltage convergence tolerance.
pub const VOLTAGE_TOLERANCE: f64 = 5e-5;

/// Maximum Newton-Raphson iterations per time step.
pub const MAX_ITERATIONS: usize = 200;

/// Leakage conductance added to every junction to keep the system
/// non-singular under reverse bias.
pub const MIN_CONDUCTANCE: f64 = 1e-12;
