//! Circuit validation.

use log::warn;

use crate::components::Device;
use crate::error::{Result, SimError};

use super::Circuit;

/// Union-find over circuit nodes.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

fn connect(set: &mut DisjointSet, device: &Device) {
    if let Some((first, rest)) = device.pins().split_first() {
        for pin in rest {
            set.union(first.0, pin.0);
        }
    }
}

/// Validate a circuit for simulation.
///
/// Checks:
/// - The circuit has at least one device
/// - No source has both terminals on the same node
/// - Every node is connected to ground through some device (probes do not
///   count, they never enter a node equation)
///
/// A node that reaches ground only through capacitors is allowed but logged,
/// since the DC operating point of such a circuit is singular.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    let devices = circuit.netlist.devices();
    if devices.is_empty() {
        return Err(SimError::InvalidTopology {
            message: "Circuit has no components".to_string(),
        });
    }

    for (name, id) in &circuit.elements {
        let Some(device) = circuit.netlist.device(*id) else {
            continue;
        };
        if matches!(device, Device::Voltage(_) | Device::Function(_)) {
            let pins = device.pins();
            if pins[0] == pins[1] {
                return Err(SimError::InvalidTopology {
                    message: format!(
                        "source '{}' is shorted: both terminals on node {}",
                        name, pins[0]
                    ),
                });
            }
        }
    }

    let n = circuit.node_count();
    let mut any = DisjointSet::new(n);
    let mut dc = DisjointSet::new(n);
    for device in devices {
        match device {
            Device::Probe(_) => {}
            Device::Capacitor(_) => connect(&mut any, device),
            _ => {
                connect(&mut any, device);
                connect(&mut dc, device);
            }
        }
    }

    for node in 1..n {
        let name = circuit.node_name(node.into()).unwrap_or("?");
        if any.find(node) != any.find(0) {
            return Err(SimError::FloatingNode { node: name.to_string() });
        }
        if dc.find(node) != dc.find(0) {
            warn!("node '{}' has no DC path to ground", name);
        }
    }

    Ok(())
}
