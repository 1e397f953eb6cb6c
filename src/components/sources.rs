//! Voltage sources: ideal DC and time-varying function sources.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::circuit::{Net, NetKind};
use crate::dsl::WaveformDef;
use crate::error::{Result, SimError};
use crate::solver::{LiveId, MnaSystem};

use super::NetMap;

/// Stamp the extra-equation pattern shared by both source kinds.
///
/// Row `i` forces `v+ - v- = b[i]`; the branch current `i` leaves the source
/// at `v+`.
fn stamp_branch(system: &mut MnaSystem, a: Net, b: Net, i: Net) {
    system.stamp_static(-1.0, a, i, "-1");
    system.stamp_static(1.0, b, i, "+1");

    system.stamp_static(1.0, i, a, "+1");
    system.stamp_static(-1.0, i, b, "-1");
}

/// An ideal voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub voltage: f64,
    pub(super) nets: NetMap<2, 1>,
}

impl VoltageSource {
    /// Create a source of `voltage` from `a` (+) to `b` (-).
    pub fn new(voltage: f64, a: Net, b: Net) -> Result<Self> {
        if !voltage.is_finite() {
            return Err(SimError::invalid_parameter(
                "voltage source",
                "voltage",
                format!("must be finite, got {}", voltage),
            ));
        }
        Ok(Self {
            voltage,
            nets: NetMap::new([a, b]),
        })
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    /// Internal net carrying the branch current.
    pub fn branch(&self) -> Net {
        self.nets.internal(0)
    }

    pub fn stamp(&self, system: &mut MnaSystem) {
        let (a, b, i) = (self.nets.pin(0), self.nets.pin(1), self.branch());
        stamp_branch(system, a, b, i);
        system.stamp_rhs(self.voltage, i, &format!("{:+.2}V", self.voltage));
        system.describe_net(
            i,
            format!("i:V({:+}):{},{}", self.voltage, a.0, b.0),
            NetKind::Current,
            1.0,
        );
    }
}

/// Source function of simulation time in seconds.
pub type SourceFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A voltage source whose value follows a function of time.
///
/// Structurally identical to [`VoltageSource`]; the forced value sits in a
/// live slot that is re-evaluated before every step, so arbitrary
/// excitations need no restamping.
#[derive(Clone)]
pub struct FunctionSource {
    func: SourceFn,
    value: f64,
    pub(super) nets: NetMap<2, 1>,
    slot: Option<LiveId>,
}

impl fmt::Debug for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSource")
            .field("value", &self.value)
            .field("nets", &self.nets)
            .finish_non_exhaustive()
    }
}

impl FunctionSource {
    /// Create a source driven by `func`, from `a` (+) to `b` (-).
    pub fn new<F>(func: F, a: Net, b: Net) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        let value = func(0.0);
        Self {
            func: Arc::new(func),
            value,
            nets: NetMap::new([a, b]),
            slot: None,
        }
    }

    /// Create a source following a standard waveform.
    pub fn from_waveform(waveform: Waveform, a: Net, b: Net) -> Self {
        Self::new(move |t| waveform.eval(t), a, b)
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    /// Internal net carrying the branch current.
    pub fn branch(&self) -> Net {
        self.nets.internal(0)
    }

    /// Value applied in the last step.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn stamp(&mut self, system: &mut MnaSystem) {
        let (a, b, i) = (self.nets.pin(0), self.nets.pin(1), self.branch());
        stamp_branch(system, a, b, i);

        let slot = system.alloc_live(self.value);
        system.bind_live_rhs(slot, i, &format!("Vfn:{},{}", a.0, b.0));
        self.slot = Some(slot);

        system.describe_net(i, format!("i:Vfn:{},{}", a.0, b.0), NetKind::Current, 1.0);
    }

    pub fn prepare(&mut self, time: f64, system: &mut MnaSystem) {
        self.value = (self.func)(time);
        if let Some(slot) = self.slot {
            system.set_live(slot, self.value);
        }
    }
}

/// Standard excitation waveforms for function sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// `offset + amplitude * sin(2*pi*frequency*t + phase)`, phase in radians
    Sine {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },
    /// `+amplitude` for the first `duty` fraction of each period, else `-amplitude`
    Square { amplitude: f64, frequency: f64, duty: f64 },
    /// `v0` up to and including `t0`, `v1` after
    Step { v0: f64, v1: f64, t0: f64 },
    /// Zero up to `t0`, then rising at `slope` volts per second
    Ramp { slope: f64, t0: f64 },
}

impl Waveform {
    /// Value at time `t`.
    pub fn eval(&self, t: f64) -> f64 {
        match *self {
            Waveform::Dc(v) => v,
            Waveform::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => offset + amplitude * (2.0 * PI * frequency * t + phase).sin(),
            Waveform::Square {
                amplitude,
                frequency,
                duty,
            } => {
                if (frequency * t).rem_euclid(1.0) < duty {
                    amplitude
                } else {
                    -amplitude
                }
            }
            Waveform::Step { v0, v1, t0 } => {
                if t > t0 {
                    v1
                } else {
                    v0
                }
            }
            Waveform::Ramp { slope, t0 } => slope * (t - t0).max(0.0),
        }
    }

    /// Build from a parsed waveform, checking argument counts and ranges.
    pub fn from_def(def: &WaveformDef) -> std::result::Result<Self, String> {
        fn args(name: &str, a: &[f64], min: usize, max: usize) -> std::result::Result<(), String> {
            if a.len() < min || a.len() > max {
                Err(format!("{} takes {} to {} arguments, got {}", name, min, max, a.len()))
            } else {
                Ok(())
            }
        }

        let w = match def {
            WaveformDef::Dc(v) => Waveform::Dc(*v),
            WaveformDef::Sin(a) => {
                args("SIN", a, 3, 4)?;
                Waveform::Sine {
                    offset: a[0],
                    amplitude: a[1],
                    frequency: a[2],
                    phase: a.get(3).copied().unwrap_or(0.0).to_radians(),
                }
            }
            WaveformDef::Square(a) => {
                args("SQUARE", a, 2, 3)?;
                let duty = a.get(2).copied().unwrap_or(0.5);
                if !(0.0..=1.0).contains(&duty) {
                    return Err(format!("SQUARE duty must be within 0..1, got {}", duty));
                }
                Waveform::Square {
                    amplitude: a[0],
                    frequency: a[1],
                    duty,
                }
            }
            WaveformDef::Step(a) => {
                args("STEP", a, 2, 3)?;
                Waveform::Step {
                    v0: a[0],
                    v1: a[1],
                    t0: a.get(2).copied().unwrap_or(0.0),
                }
            }
            WaveformDef::Ramp(a) => {
                args("RAMP", a, 1, 2)?;
                Waveform::Ramp {
                    slope: a[0],
                    t0: a.get(1).copied().unwrap_or(0.0),
                }
            }
        };
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_voltage_source_stamp() {
        let mut v = VoltageSource::new(12.0, Net(1), Net(0)).unwrap();
        let mut next = 2;
        v.nets.claim(&mut next);
        let mut sys = MnaSystem::new(3);
        v.stamp(&mut sys);
        let i = v.branch();
        assert_eq!(sys.cell(Net(1), i).g, -1.0);
        assert_eq!(sys.cell(i, Net(1)).g, 1.0);
        assert_eq!(sys.cell(i, Net(0)).g, -1.0);
        assert_eq!(sys.rhs(i).g, 12.0);
        assert_eq!(sys.net_info(i).kind, NetKind::Current);
    }

    #[test]
    fn test_voltage_source_rejects_nan() {
        assert!(VoltageSource::new(f64::NAN, Net(1), Net(0)).is_err());
    }

    #[test]
    fn test_function_source_writes_live_value() {
        let mut f = FunctionSource::new(|t| 3.0 * t, Net(1), Net(0));
        assert_eq!(f.value(), 0.0);
        let mut next = 2;
        f.nets.claim(&mut next);
        let mut sys = MnaSystem::new(3);
        f.stamp(&mut sys);
        f.prepare(2.0, &mut sys);
        sys.set_step_scale(0.0);
        sys.refresh();
        assert_eq!(sys.rhs(f.branch()).value, 6.0);
    }

    #[test]
    fn test_waveforms() {
        let sine = Waveform::Sine {
            offset: 1.0,
            amplitude: 2.0,
            frequency: 50.0,
            phase: 0.0,
        };
        assert_relative_eq!(sine.eval(0.005), 3.0, epsilon = 1e-12);

        let sq = Waveform::Square {
            amplitude: 0.25,
            frequency: 1000.0,
            duty: 0.5,
        };
        assert_eq!(sq.eval(0.0001), 0.25);
        assert_eq!(sq.eval(0.0007), -0.25);

        let step = Waveform::Step { v0: 0.0, v1: 5.0, t0: 0.0 };
        assert_eq!(step.eval(0.0), 0.0);
        assert_eq!(step.eval(1e-9), 5.0);

        let ramp = Waveform::Ramp { slope: 1000.0, t0: 1e-3 };
        assert_eq!(ramp.eval(0.0), 0.0);
        assert_relative_eq!(ramp.eval(2e-3), 1.0);
    }

    #[test]
    fn test_waveform_from_def() {
        let w = Waveform::from_def(&WaveformDef::Sin(vec![0.0, 1.0, 1e3, 90.0])).unwrap();
        assert_relative_eq!(w.eval(0.0), 1.0, epsilon = 1e-12);
        assert!(Waveform::from_def(&WaveformDef::Sin(vec![1.0])).is_err());
        assert!(Waveform::from_def(&WaveformDef::Square(vec![1.0, 1e3, 1.5])).is_err());
    }
}
