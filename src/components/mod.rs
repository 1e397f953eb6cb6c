//! Device models for circuit simulation.
//!
//! This module provides models for all supported circuit elements:
//! - Linear: Resistor, Capacitor
//! - Sources: ideal Voltage Source, time-varying Function Source
//! - Instrumentation: Probe
//! - Nonlinear: Diode, BJT (sharing the [`PnJunction`] model)
//!
//! Every device goes through the same life cycle, dispatched by [`Device`]:
//! pins are checked and internal nets claimed when it is added, it is
//! stamped once when the netlist is finalized, and afterwards it only
//! exchanges values with the system through live slots.

mod bjt;
mod diode;
mod junction;
mod linear;
mod probe;
mod sources;

pub use bjt::{Bjt, BjtParams, BjtType};
pub use diode::{Diode, DiodeParams};
pub use junction::{JunctionSlots, PnJunction};
pub use linear::{Capacitor, Resistor};
pub use probe::Probe;
pub use sources::{FunctionSource, SourceFn, VoltageSource, Waveform};

use crate::circuit::Net;
use crate::dsl::{ElementDef, ElementKind, ModelDef, WaveformDef};
use crate::error::{Result, SimError};
use crate::solver::MnaSystem;

/// Pin and internal-net assignment of a device with `P` pins and `I`
/// internal unknowns.
///
/// Combined indices put the pins first, then the internal nets, in the
/// order the device claimed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetMap<const P: usize, const I: usize> {
    pins: [Net; P],
    internal: [Net; I],
}

impl<const P: usize, const I: usize> NetMap<P, I> {
    /// Pins connected; internal nets not yet claimed.
    pub fn new(pins: [Net; P]) -> Self {
        Self {
            pins,
            internal: [Net::GROUND; I],
        }
    }

    /// The external pins.
    pub fn pins(&self) -> &[Net] {
        &self.pins
    }

    /// Pin `k`.
    pub fn pin(&self, k: usize) -> Net {
        self.pins[k]
    }

    /// Internal net `k`.
    pub fn internal(&self, k: usize) -> Net {
        self.internal[k]
    }

    /// Net `k` of the combined pins-then-internal list.
    pub fn net(&self, k: usize) -> Net {
        if k < P {
            self.pins[k]
        } else {
            self.internal[k - P]
        }
    }

    /// Claim `I` fresh nets from the running counter.
    pub fn claim(&mut self, next_net: &mut usize) {
        for net in self.internal.iter_mut() {
            *net = Net(*next_net);
            *next_net += 1;
        }
    }
}

/// A circuit device.
#[derive(Debug, Clone)]
pub enum Device {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Voltage(VoltageSource),
    Function(FunctionSource),
    Probe(Probe),
    Diode(Diode),
    Bjt(Bjt),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            Device::Resistor($d) => $body,
            Device::Capacitor($d) => $body,
            Device::Voltage($d) => $body,
            Device::Function($d) => $body,
            Device::Probe($d) => $body,
            Device::Diode($d) => $body,
            Device::Bjt($d) => $body,
        }
    };
}

impl Device {
    /// Short kind name, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Device::Resistor(_) => "resistor",
            Device::Capacitor(_) => "capacitor",
            Device::Voltage(_) => "voltage source",
            Device::Function(_) => "function source",
            Device::Probe(_) => "probe",
            Device::Diode(_) => "diode",
            Device::Bjt(_) => "bjt",
        }
    }

    /// External pin nets.
    pub fn pins(&self) -> &[Net] {
        dispatch!(self, d => d.nets.pins())
    }

    /// Number of external pins.
    pub fn pin_count(&self) -> usize {
        self.pins().len()
    }

    /// Claim any internal nets from the running net counter.
    pub fn setup_nets(&mut self, next_net: &mut usize) {
        dispatch!(self, d => d.nets.claim(next_net))
    }

    /// Stamp every contribution and register live values. Called once.
    pub fn stamp(&mut self, system: &mut MnaSystem) {
        dispatch!(self, d => d.stamp(system))
    }

    /// Refresh time-dependent inputs before the Newton loop of a step that
    /// solves for `time`.
    pub fn prepare(&mut self, time: f64, system: &mut MnaSystem) {
        if let Device::Function(f) = self {
            f.prepare(time, system);
        }
    }

    /// Return true if the last linearization still holds for the current
    /// solution; otherwise relinearize and return false.
    pub fn newton(&mut self, system: &mut MnaSystem, tolerance: f64) -> bool {
        match self {
            Device::Diode(d) => d.newton(system, tolerance),
            Device::Bjt(q) => q.newton(system, tolerance),
            _ => true,
        }
    }

    /// Capture solved state after a converged step.
    pub fn update(&mut self, system: &mut MnaSystem) {
        if let Device::Capacitor(c) = self {
            c.update(system);
        }
    }

    /// Rescale stored state for a time step change; `new_per_old` is the
    /// ratio of the new step size to the old one (0 when leaving DC).
    pub fn scale_time(&mut self, new_per_old: f64, system: &mut MnaSystem) {
        if let Device::Capacitor(c) = self {
            c.scale_time(new_per_old, system);
        }
    }

    /// Whether the device needs Newton iteration.
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Device::Diode(_) | Device::Bjt(_))
    }

    /// Build a device from a netlist element definition.
    pub fn from_def(def: &ElementDef, pins: &[Net], model: Option<&ModelDef>) -> Result<Self> {
        let expected = def.kind.expected_node_count();
        if pins.len() != expected {
            return Err(SimError::invalid_component(
                &def.name,
                def.line,
                format!("expected {} nodes, got {}", expected, pins.len()),
            ));
        }
        let value = || {
            def.value.ok_or_else(|| {
                let message = format!("{} requires a value", def.kind);
                SimError::invalid_component(&def.name, def.line, message)
            })
        };

        let device = match def.kind {
            ElementKind::Resistor => Resistor::new(value()?, pins[0], pins[1]).map(Device::from),
            ElementKind::Capacitor => Capacitor::new(value()?, pins[0], pins[1]).map(Device::from),
            ElementKind::VoltageSource => {
                VoltageSource::new(value()?, pins[0], pins[1]).map(Device::from)
            }
            ElementKind::FunctionSource => {
                let waveform = match &def.waveform {
                    Some(w) => Waveform::from_def(w),
                    None => Waveform::from_def(&WaveformDef::Dc(value()?)),
                }
                .map_err(|message| SimError::invalid_component(&def.name, def.line, message))?;
                Ok(Device::from(FunctionSource::from_waveform(waveform, pins[0], pins[1])))
            }
            ElementKind::Probe => Ok(Device::from(Probe::new(pins[0], pins[1]))),
            ElementKind::Diode => {
                let params = model.map(DiodeParams::from_model).transpose()?.unwrap_or_default();
                Diode::with_params(pins[0], pins[1], params).map(Device::from)
            }
            ElementKind::Bjt => {
                let (kind, params) = match model {
                    Some(m) => BjtParams::from_model(m)?,
                    None => (BjtType::Npn, BjtParams::default()),
                };
                Bjt::with_params(pins[0], pins[1], pins[2], kind, params).map(Device::from)
            }
        };

        device.map_err(|e| match e {
            SimError::InvalidParameter { param, message, .. } => {
                SimError::invalid_component(&def.name, def.line, format!("{}: {}", param, message))
            }
            other => other,
        })
    }
}

macro_rules! impl_from_device {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Device {
                fn from(d: $ty) -> Self {
                    Device::$variant(d)
                }
            }
        )*
    };
}

impl_from_device! {
    Resistor => Resistor,
    Capacitor => Capacitor,
    VoltageSource => Voltage,
    FunctionSource => Function,
    Probe => Probe,
    Diode => Diode,
    Bjt => Bjt,
}

const UNIT_SUFFIXES: [&str; 8] = ["p", "n", "u", "m", "", "k", "M", "G"];
const UNIT_OFFSET: i32 = 4;

/// Format a value with an engineering suffix, e.g. `100k`, `47nF`.
pub fn format_unit_value(v: f64, unit: &str) -> String {
    let mut suffix = UNIT_OFFSET + (v.log10() as i32) / 3;
    if v < 1.0 {
        suffix -= 1;
    }
    let suffix = suffix.clamp(0, UNIT_SUFFIXES.len() as i32 - 1);
    let scaled = v / 10f64.powi(3 * (suffix - UNIT_OFFSET));
    format!("{:.0}{}{}", scaled, UNIT_SUFFIXES[suffix as usize], unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_map_claims_in_order() {
        let mut nets: NetMap<2, 2> = NetMap::new([Net(1), Net(0)]);
        let mut next = 5;
        nets.claim(&mut next);
        assert_eq!(next, 7);
        assert_eq!(nets.pins(), &[Net(1), Net(0)]);
        assert_eq!(nets.net(2), Net(5));
        assert_eq!(nets.net(3), Net(6));
        assert_eq!(nets.internal(1), Net(6));
    }

    #[test]
    fn test_format_unit_value() {
        assert_eq!(format_unit_value(100e3, ""), "100k");
        assert_eq!(format_unit_value(4.7e3, ""), "5k");
        assert_eq!(format_unit_value(100e-9, "F"), "100nF");
        assert_eq!(format_unit_value(1.0, "F"), "1F");
        assert_eq!(format_unit_value(680.0, ""), "680");
        assert_eq!(format_unit_value(2.2e6, ""), "2M");
    }

    #[test]
    fn test_dispatch_basics() {
        let r = Device::from(Resistor::new(1e3, Net(1), Net(2)).unwrap());
        assert_eq!(r.kind(), "resistor");
        assert_eq!(r.pin_count(), 2);
        assert!(!r.is_nonlinear());

        let q = Device::from(Bjt::new(Net(1), Net(2), Net(3), BjtType::Npn));
        assert_eq!(q.pin_count(), 3);
        assert!(q.is_nonlinear());
    }
}
