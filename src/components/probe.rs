//! Differential voltage probe.

use crate::circuit::{Net, NetKind};
use crate::solver::MnaSystem;

use super::NetMap;

/// Makes `v+ - v-` a solved unknown of its own.
///
/// The probe only adds its own row (`v+ - v- - vd = 0`) and never appears in
/// a node equation, so it has no effect on the network.
#[derive(Debug, Clone)]
pub struct Probe {
    pub(super) nets: NetMap<2, 1>,
}

impl Probe {
    pub fn new(a: Net, b: Net) -> Self {
        Self {
            nets: NetMap::new([a, b]),
        }
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    /// Net holding the probed voltage.
    pub fn output(&self) -> Net {
        self.nets.internal(0)
    }

    pub fn stamp(&self, system: &mut MnaSystem) {
        let (a, b, d) = (self.nets.pin(0), self.nets.pin(1), self.output());
        system.stamp_static(1.0, d, a, "+1");
        system.stamp_static(-1.0, d, b, "-1");
        system.stamp_static(-1.0, d, d, "-1");

        system.describe_net(d, "v:probe", NetKind::Voltage, 1.0);
    }
}
