//! Linear passive components: Resistor, Capacitor.

use crate::circuit::{Net, NetKind};
use crate::error::{Result, SimError};
use crate::solver::{LiveId, MnaSystem};

use super::{format_unit_value, NetMap};

/// A resistor component.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub resistance: f64,
    pub(super) nets: NetMap<2, 0>,
}

impl Resistor {
    /// Create a new resistor between `a` and `b`.
    ///
    /// Zero, negative and non-finite resistances are rejected; a short
    /// would put an infinite conductance into the matrix.
    pub fn new(resistance: f64, a: Net, b: Net) -> Result<Self> {
        if !(resistance.is_finite() && resistance > 0.0) {
            return Err(SimError::invalid_parameter(
                "resistor",
                "resistance",
                format!("must be positive and finite, got {}", resistance),
            ));
        }
        Ok(Self {
            resistance,
            nets: NetMap::new([a, b]),
        })
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    pub fn stamp(&self, system: &mut MnaSystem) {
        let (a, b) = (self.nets.pin(0), self.nets.pin(1));
        let txt = format!("R{}", format_unit_value(self.resistance, ""));
        let g = self.conductance();
        system.stamp_static(g, a, a, &format!("+{}", txt));
        system.stamp_static(-g, a, b, &format!("-{}", txt));
        system.stamp_static(-g, b, a, &format!("-{}", txt));
        system.stamp_static(g, b, b, &format!("+{}", txt));
    }
}

/// A capacitor component.
///
/// Trapezoidal integration, rewritten so the capacitor carries its own
/// state row instead of a history current source. With T = 1/dt and
/// g = 2C:
///
/// ```text
/// | -g*T  +g*T  +T | v+
/// | +g*T  -g*T  -T | v-
/// | +2*g  -2*g  -1 | state  = previous state
/// ```
///
/// For a constant step, `i1 = g*T*v1 - T*s0` with `s0 = g*v0 + i0/T`, and the
/// state row yields `s1 = 2*g*v1 - s0`. Substituting gives
/// `i1 = T * (s1 - g*v1)`, so the next step only needs the new state copied
/// back in; no explicit history is kept.
///
/// The state is `2*C*v + i*dt`, which is why it is converted for display in
/// [`Capacitor::update`] and rescaled in [`Capacitor::scale_time`].
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub capacitance: f64,
    pub(super) nets: NetMap<2, 1>,

    state: f64,
    voltage: f64,
    current: f64,
    state_slot: Option<LiveId>,
}

impl Capacitor {
    /// Create a new, discharged capacitor between `a` and `b`.
    pub fn new(capacitance: f64, a: Net, b: Net) -> Result<Self> {
        if !(capacitance.is_finite() && capacitance > 0.0) {
            return Err(SimError::invalid_parameter(
                "capacitor",
                "capacitance",
                format!("must be positive and finite, got {}", capacitance),
            ));
        }
        Ok(Self {
            capacitance,
            nets: NetMap::new([a, b]),
            state: 0.0,
            voltage: 0.0,
            current: 0.0,
            state_slot: None,
        })
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    /// Internal net holding the integration state.
    pub fn state_net(&self) -> Net {
        self.nets.internal(0)
    }

    /// Terminal voltage at the last converged step.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Current from `a` to `b` at the last converged step (0 in DC).
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Integration state, `2*C*v + i*dt`.
    pub fn state(&self) -> f64 {
        self.state
    }

    pub fn stamp(&mut self, system: &mut MnaSystem) {
        let (a, b, s) = (self.nets.pin(0), self.nets.pin(1), self.state_net());
        let buf = format_unit_value(self.capacitance, "F");

        // trapezoidal needs the extra factor of two in g since
        // c*(v1 - v0) = (i1 + i0) * dt / 2
        let g = 2.0 * self.capacitance;

        system.stamp_timed(1.0, a, s, "+t");
        system.stamp_timed(-1.0, b, s, "-t");

        system.stamp_timed(-g, a, a, &format!("-t*{}", buf));
        system.stamp_timed(g, a, b, &format!("+t*{}", buf));
        system.stamp_timed(g, b, a, &format!("+t*{}", buf));
        system.stamp_timed(-g, b, b, &format!("-t*{}", buf));

        system.stamp_static(2.0 * g, s, a, &format!("+2*{}", buf));
        system.stamp_static(-2.0 * g, s, b, &format!("-2*{}", buf));
        system.stamp_static(-1.0, s, s, "-1");

        let slot = system.alloc_live(self.state);
        system.bind_live_rhs(slot, s, &format!("q:C:{},{}", a.0, b.0));
        self.state_slot = Some(slot);

        // the state net is shown as the capacitor voltage, see update()
        system.describe_net(
            s,
            format!("v:C:{},{}", a.0, b.0),
            NetKind::Voltage,
            1.0 / self.capacitance,
        );
    }

    pub fn update(&mut self, system: &mut MnaSystem) {
        let (a, b, s) = (self.nets.pin(0), self.nets.pin(1), self.state_net());
        self.state = system.solution(s);
        self.voltage = system.solution(a) - system.solution(b);
        self.current = (self.state - 2.0 * self.capacitance * self.voltage) * system.step_scale();
        if let Some(slot) = self.state_slot {
            system.set_live(slot, self.state);
        }

        // shown as the charge, scaled back to the voltage by the net info
        system.set_display(s, self.capacitance * self.voltage);
    }

    /// Keep the voltage part of the state and rescale the current part,
    /// which carries a factor of dt. Leaving DC passes 0.
    pub fn scale_time(&mut self, new_per_old: f64, system: &mut MnaSystem) {
        let qq = 2.0 * self.capacitance * self.voltage;
        self.state = qq + (self.state - qq) * new_per_old;
        if let Some(slot) = self.state_slot {
            system.set_live(slot, self.state);
        }
    }
}
