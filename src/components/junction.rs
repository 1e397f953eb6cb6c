//! PN-junction model shared by diodes and both BJT junctions.
//!
//! The junction law is
//!   I = Is * (exp(V / (n * Vt)) - 1) + Gmin * V
//!
//! and each Newton iteration replaces it by its Norton companion around the
//! last estimate V0:
//!   I ≈ Geq * V - Ieq,   Geq = dI/dV at V0,   Ieq = V0 * Geq - I(V0)
//!
//! A proposed voltage above the critical voltage is pulled back with a
//! logarithmic step before relinearizing, so the exponential cannot
//! overshoot.

use crate::circuit::Net;
use crate::solver::{LiveId, MnaSystem, MIN_CONDUCTANCE};
use crate::THERMAL_VOLTAGE;

/// Linearization state and parameters of one PN junction.
#[derive(Debug, Clone, PartialEq)]
pub struct PnJunction {
    /// Equivalent conductance at the linearization point
    pub geq: f64,
    /// Equivalent current at the linearization point
    pub ieq: f64,
    /// Linearization voltage
    pub veq: f64,

    /// Saturation current
    is: f64,
    /// Ideality factor times thermal voltage
    nvt: f64,
    rnvt: f64,
    /// Voltage above which steps are limited
    vcrit: f64,
}

impl PnJunction {
    /// Create a junction linearized at V = 0.
    pub fn new(is: f64, n: f64) -> Self {
        let nvt = n * THERMAL_VOLTAGE;
        let mut pn = Self {
            geq: 0.0,
            ieq: 0.0,
            veq: 0.0,
            is,
            nvt,
            rnvt: 1.0 / nvt,
            vcrit: nvt * (nvt / (is * std::f64::consts::SQRT_2)).ln(),
        };
        pn.linearize(0.0);
        pn
    }

    /// Saturation current.
    pub fn saturation_current(&self) -> f64 {
        self.is
    }

    /// Ideality factor times thermal voltage.
    pub fn nvt(&self) -> f64 {
        self.nvt
    }

    /// Critical voltage.
    pub fn vcrit(&self) -> f64 {
        self.vcrit
    }

    /// Junction current at `v`, leakage included.
    pub fn current(&self, v: f64) -> f64 {
        self.is * ((v * self.rnvt).exp() - 1.0) + MIN_CONDUCTANCE * v
    }

    /// Linearize at `v`.
    pub fn linearize(&mut self, v: f64) {
        let e = self.is * (v * self.rnvt).exp();
        let i = e - self.is + MIN_CONDUCTANCE * v;
        let g = e * self.rnvt + MIN_CONDUCTANCE;

        self.geq = g;
        self.ieq = v * g - i;
        self.veq = v;
    }

    /// Check a solved junction voltage against the linearization point.
    ///
    /// Returns true when it is within `tolerance`; otherwise relinearizes
    /// (after limiting) and returns false.
    pub fn newton(&mut self, v: f64, tolerance: f64) -> bool {
        let dv = v - self.veq;
        if dv.abs() < tolerance {
            return true;
        }

        let v = if v > self.vcrit {
            self.veq + self.nvt * self.is.max(1.0 + dv * self.rnvt).ln()
        } else {
            v
        };

        self.linearize(v);
        false
    }
}

/// Live values carrying one junction's companion model into the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionSlots {
    geq: LiveId,
    ieq: LiveId,
}

impl JunctionSlots {
    /// Bind `pn`'s conductance at (net, net) and its current at b[net].
    pub fn bind(
        pn: &PnJunction,
        system: &mut MnaSystem,
        net: Net,
        gm_label: &str,
        i0_label: &str,
    ) -> Self {
        let geq = system.alloc_live(pn.geq);
        let ieq = system.alloc_live(pn.ieq);
        system.bind_live(geq, net, net, gm_label);
        system.bind_live_rhs(ieq, net, i0_label);
        Self { geq, ieq }
    }

    /// Write the junction's current linearization through to the system.
    pub fn publish(&self, pn: &PnJunction, system: &mut MnaSystem) {
        system.set_live(self.geq, pn.geq);
        system.set_live(self.ieq, pn.ieq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_linearization_at_zero() {
        let pn = PnJunction::new(35e-12, 1.24);
        assert_eq!(pn.veq, 0.0);
        assert_relative_eq!(pn.geq, 35e-12 / (1.24 * THERMAL_VOLTAGE) + MIN_CONDUCTANCE);
        assert_relative_eq!(pn.ieq, 0.0);
    }

    #[test]
    fn test_companion_matches_law_at_point() {
        let mut pn = PnJunction::new(1e-14, 1.0);
        pn.linearize(0.6);
        // Geq * V - Ieq reproduces the law at the linearization voltage
        assert_relative_eq!(pn.geq * 0.6 - pn.ieq, pn.current(0.6), max_relative = 1e-12);
    }

    #[test]
    fn test_critical_voltage() {
        let pn = PnJunction::new(35e-12, 1.24);
        let nvt = 1.24 * THERMAL_VOLTAGE;
        assert_relative_eq!(pn.vcrit(), nvt * (nvt / (35e-12 * 2f64.sqrt())).ln());
        assert!(pn.vcrit() > 0.5 && pn.vcrit() < 0.8);
    }

    #[test]
    fn test_newton_accepts_within_tolerance() {
        let mut pn = PnJunction::new(35e-12, 1.24);
        assert!(pn.newton(1e-5, 5e-5));
        assert_eq!(pn.veq, 0.0);
    }

    #[test]
    fn test_newton_limits_large_forward_step() {
        let mut pn = PnJunction::new(35e-12, 1.24);
        assert!(!pn.newton(5.0, 5e-5));
        // log back-off keeps the new point far below the proposal
        let expected = pn.nvt() * (1.0 + 5.0 / pn.nvt()).ln();
        assert_relative_eq!(pn.veq, expected, max_relative = 1e-12);
        assert!(pn.veq < pn.vcrit());
        assert!(pn.geq.is_finite() && pn.ieq.is_finite());
    }

    #[test]
    fn test_newton_takes_reverse_step_directly() {
        let mut pn = PnJunction::new(35e-12, 1.24);
        assert!(!pn.newton(-3.0, 5e-5));
        assert_eq!(pn.veq, -3.0);
        // reverse bias leaves the leakage conductance
        assert!(pn.geq >= MIN_CONDUCTANCE);
    }
}
