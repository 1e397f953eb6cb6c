//! Core types for circuit representation.

use std::fmt;

/// An index into the solved unknown vector.
///
/// Nets below the netlist's node count are physical circuit nodes; the rest
/// are internal unknowns claimed by devices (branch currents, junction
/// voltages, capacitor state). Net 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Net(pub usize);

impl Net {
    /// The ground net (always index 0).
    pub const GROUND: Net = Net(0);

    /// Check if this is the ground net.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for Net {
    fn from(index: usize) -> Self {
        Net(index)
    }
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "n{}", self.0)
        }
    }
}

/// Handle to a device owned by a [`Netlist`](crate::solver::Netlist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// What a net's solved value represents, for display ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetKind {
    #[default]
    Voltage,
    Current,
}

/// Display metadata for one net.
#[derive(Debug, Clone, PartialEq)]
pub struct NetInfo {
    pub kind: NetKind,
    /// Factor applied to the solved value for display (e.g. charge to voltage)
    pub scale: f64,
    pub name: String,
}

impl NetInfo {
    /// Default metadata: a voltage net named `v<index>`.
    pub fn voltage(index: usize) -> Self {
        Self {
            kind: NetKind::Voltage,
            scale: 1.0,
            name: format!("v{}", index),
        }
    }
}
