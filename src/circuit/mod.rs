//! Circuit representation and validation.
//!
//! [`Net`] and the other core types are used throughout the crate. The
//! [`Circuit`] struct ties a [`Netlist`](crate::solver::Netlist) built from
//! the DSL to the node and element names it was written with.

mod graph;
mod types;
mod validate;

pub use graph::Circuit;
pub use types::*;
pub use validate::validate_circuit;
