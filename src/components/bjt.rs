//! BJT (Bipolar Junction Transistor) model.
//!
//! Ebers-Moll transport model built from two [`PnJunction`]s, each with a
//! series resistance. Besides base, collector and emitter the device owns
//! four internal unknowns: both junction voltages and both junction
//! currents.
//!
//! ```text
//! Ic = af*Ibe - Ibc
//! Ie = Ibe - ar*Ibc
//! Ib = (1-af)*Ibe + (1-ar)*Ibc
//! ```
//!
//! with `af = bf/(1+bf)` and `ar = br/(1+br)`. The emitter junction
//! saturates at `is/af` and the collector junction at `is/ar`. A PNP device
//! flips the sign linking each junction voltage to its current.

use std::fmt;

use crate::circuit::{Net, NetKind};
use crate::dsl::{ModelDef, ModelType};
use crate::error::{Result, SimError};
use crate::solver::MnaSystem;

use super::junction::{JunctionSlots, PnJunction};
use super::NetMap;

/// BJT type (NPN or PNP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtType {
    Npn,
    Pnp,
}

impl BjtType {
    fn sign(self) -> f64 {
        match self {
            BjtType::Npn => 1.0,
            BjtType::Pnp => -1.0,
        }
    }
}

impl fmt::Display for BjtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BjtType::Npn => write!(f, "NPN"),
            BjtType::Pnp => write!(f, "PNP"),
        }
    }
}

/// Parameters for a BJT model.
#[derive(Debug, Clone, PartialEq)]
pub struct BjtParams {
    /// Forward current gain (β_F)
    pub bf: f64,
    /// Reverse current gain (β_R)
    pub br: f64,
    /// Transport saturation current
    pub is: f64,
    /// Ideality factor
    pub n: f64,
    /// Base-collector series resistance
    pub rsbc: f64,
    /// Base-emitter series resistance
    pub rsbe: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            bf: 200.0,
            br: 20.0,
            is: 6.734e-15,
            n: 1.24,
            rsbc: 5.8377,
            rsbe: 8.49471,
        }
    }
}

impl BjtParams {
    /// Create parameters from a model definition.
    pub fn from_model(model: &ModelDef) -> Result<(BjtType, Self)> {
        let bjt_type = match model.model_type {
            ModelType::Npn => BjtType::Npn,
            ModelType::Pnp => BjtType::Pnp,
            _ => {
                return Err(SimError::InvalidParameter {
                    component: model.name.clone(),
                    param: "type".to_string(),
                    message: "expected NPN or PNP model type".to_string(),
                });
            }
        };

        let mut params = Self::default();
        for (key, slot) in [
            ("bf", &mut params.bf),
            ("br", &mut params.br),
            ("is", &mut params.is),
            ("n", &mut params.n),
            ("rsbc", &mut params.rsbc),
            ("rsbe", &mut params.rsbe),
        ] {
            if let Some(&v) = model.params.get(key) {
                *slot = v;
            }
        }

        Ok((bjt_type, params))
    }

    /// Forward common-base gain.
    pub fn alpha_f(&self) -> f64 {
        self.bf / (1.0 + self.bf)
    }

    /// Reverse common-base gain.
    pub fn alpha_r(&self) -> f64 {
        self.br / (1.0 + self.br)
    }

    fn validate(&self) -> Result<()> {
        let positive = [("bf", self.bf), ("br", self.br), ("is", self.is), ("n", self.n)];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(SimError::invalid_parameter(
                    "bjt",
                    name,
                    format!("must be > 0, got {}", v),
                ));
            }
        }
        for (name, v) in [("rsbc", self.rsbc), ("rsbe", self.rsbe)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(SimError::invalid_parameter(
                    "bjt",
                    name,
                    format!("must be >= 0, got {}", v),
                ));
            }
        }
        Ok(())
    }
}

// Net order: pins b, c, e then internal vbc, vbe, ibc, ibe.
const B: usize = 0;
const C: usize = 1;
const E: usize = 2;
const VBC: usize = 3;
const VBE: usize = 4;
const IBC: usize = 5;
const IBE: usize = 6;

/// A BJT component.
#[derive(Debug, Clone)]
pub struct Bjt {
    pub bjt_type: BjtType,
    pub params: BjtParams,
    pub(super) nets: NetMap<3, 4>,
    pn_c: PnJunction,
    pn_e: PnJunction,
    slots: Option<(JunctionSlots, JunctionSlots)>,
}

impl Bjt {
    /// Create a transistor with default parameters.
    pub fn new(base: Net, collector: Net, emitter: Net, bjt_type: BjtType) -> Self {
        Self::build(base, collector, emitter, bjt_type, BjtParams::default())
    }

    /// Create a transistor with custom parameters.
    pub fn with_params(
        base: Net,
        collector: Net,
        emitter: Net,
        bjt_type: BjtType,
        params: BjtParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self::build(base, collector, emitter, bjt_type, params))
    }

    fn build(
        base: Net,
        collector: Net,
        emitter: Net,
        bjt_type: BjtType,
        params: BjtParams,
    ) -> Self {
        Self {
            pn_c: PnJunction::new(params.is / params.alpha_r(), params.n),
            pn_e: PnJunction::new(params.is / params.alpha_f(), params.n),
            bjt_type,
            params,
            nets: NetMap::new([base, collector, emitter]),
            slots: None,
        }
    }

    /// Pin nets: base, collector, emitter.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    pub fn base(&self) -> Net {
        self.nets.net(B)
    }

    pub fn collector(&self) -> Net {
        self.nets.net(C)
    }

    pub fn emitter(&self) -> Net {
        self.nets.net(E)
    }

    /// Internal net holding the base-collector junction voltage.
    pub fn bc_junction_net(&self) -> Net {
        self.nets.net(VBC)
    }

    /// Internal net holding the base-emitter junction voltage.
    pub fn be_junction_net(&self) -> Net {
        self.nets.net(VBE)
    }

    /// Base-collector and base-emitter junctions.
    pub fn junctions(&self) -> (&PnJunction, &PnJunction) {
        (&self.pn_c, &self.pn_e)
    }

    /// Current into the collector pin for the solution held by `system`.
    pub fn collector_current(&self, system: &MnaSystem) -> f64 {
        let ibc = system.solution(self.nets.net(IBC));
        let ibe = system.solution(self.nets.net(IBE));
        self.params.alpha_f() * ibe - ibc
    }

    /// Current into the base pin for the solution held by `system`.
    pub fn base_current(&self, system: &MnaSystem) -> f64 {
        let ibc = system.solution(self.nets.net(IBC));
        let ibe = system.solution(self.nets.net(IBE));
        (1.0 - self.params.alpha_f()) * ibe + (1.0 - self.params.alpha_r()) * ibc
    }

    pub fn stamp(&mut self, system: &mut MnaSystem) {
        let n = |k: usize| self.nets.net(k);
        let af = self.params.alpha_f();
        let ar = self.params.alpha_r();
        let s = self.bjt_type.sign();

        // base current
        system.stamp_static(1.0 - ar, n(B), n(IBC), &format!("{:.3}", 1.0 - ar));
        system.stamp_static(1.0 - af, n(B), n(IBE), &format!("{:.3}", 1.0 - af));

        system.stamp_static(-1.0, n(C), n(IBC), "-1");
        system.stamp_static(-1.0, n(E), n(IBE), "-1");

        system.stamp_static(self.params.rsbc, n(IBC), n(IBC), "rsbc");
        system.stamp_static(self.params.rsbe, n(IBE), n(IBE), "rsbe");

        // junction voltages against junction currents, sign flips for PNP
        let sign_label = if s > 0.0 { ("+1", "-1") } else { ("-1", "+1") };
        system.stamp_static(s, n(IBC), n(VBC), sign_label.0);
        system.stamp_static(-s, n(VBC), n(IBC), sign_label.1);
        system.stamp_static(s, n(IBE), n(VBE), sign_label.0);
        system.stamp_static(-s, n(VBE), n(IBE), sign_label.1);

        system.stamp_static(-1.0, n(IBC), n(B), "-1");
        system.stamp_static(1.0, n(IBC), n(C), "+1");
        system.stamp_static(-1.0, n(IBE), n(B), "-1");
        system.stamp_static(1.0, n(IBE), n(E), "+1");

        // transport terms
        system.stamp_static(ar, n(E), n(IBC), &format!("+{:.3}", ar));
        system.stamp_static(af, n(C), n(IBE), &format!("+{:.3}", af));

        let pins = format!("{},{},{}", n(B).0, n(C).0, n(E).0);
        let (bc, be) = match self.bjt_type {
            BjtType::Npn => ("bc", "be"),
            BjtType::Pnp => ("cb", "eb"),
        };

        let slot_c = JunctionSlots::bind(
            &self.pn_c,
            system,
            n(VBC),
            "gm:Qbc",
            &format!("i0:Q:{}:cb", pins),
        );
        let slot_e = JunctionSlots::bind(
            &self.pn_e,
            system,
            n(VBE),
            "gm:Qbe",
            &format!("i0:Q:{}:eb", pins),
        );

        system.describe_net(n(VBC), format!("v:Q:{}:{}", pins, bc), NetKind::Voltage, 1.0);
        system.describe_net(n(VBE), format!("v:Q:{}:{}", pins, be), NetKind::Voltage, 1.0);

        // shown as base current contributions
        system.describe_net(n(IBC), format!("i:Q:{}:bc", pins), NetKind::Current, 1.0 - ar);
        system.describe_net(n(IBE), format!("i:Q:{}:be", pins), NetKind::Current, 1.0 - af);

        self.slots = Some((slot_c, slot_e));
    }

    pub fn newton(&mut self, system: &mut MnaSystem, tolerance: f64) -> bool {
        let vbc = system.solution(self.nets.net(VBC));
        let vbe = system.solution(self.nets.net(VBE));
        // both junctions must relinearize, no short-circuit
        let done = self.pn_c.newton(vbc, tolerance) & self.pn_e.newton(vbe, tolerance);
        if let Some((slot_c, slot_e)) = &self.slots {
            slot_c.publish(&self.pn_c, system);
            slot_e.publish(&self.pn_e, system);
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn model(model_type: ModelType, params: &[(&str, f64)]) -> ModelDef {
        ModelDef {
            name: "QX".to_string(),
            model_type,
            params: params.iter().map(|&(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>(),
            line: 1,
        }
    }

    #[test]
    fn test_default_gains() {
        let p = BjtParams::default();
        assert_relative_eq!(p.alpha_f(), 200.0 / 201.0);
        assert_relative_eq!(p.alpha_r(), 20.0 / 21.0);
    }

    #[test]
    fn test_junction_saturation_currents() {
        let q = Bjt::new(Net(1), Net(2), Net(3), BjtType::Npn);
        let (c, e) = q.junctions();
        assert_relative_eq!(c.saturation_current(), 6.734e-15 * 21.0 / 20.0);
        assert_relative_eq!(e.saturation_current(), 6.734e-15 * 201.0 / 200.0);
    }

    #[test]
    fn test_params_from_model() {
        let m = model(ModelType::Pnp, &[("bf", 100.0), ("rsbe", 0.0)]);
        let (kind, p) = BjtParams::from_model(&m).unwrap();
        assert_eq!(kind, BjtType::Pnp);
        assert_eq!(p.bf, 100.0);
        assert_eq!(p.rsbe, 0.0);
        assert_eq!(p.br, 20.0);

        assert!(BjtParams::from_model(&model(ModelType::Diode, &[])).is_err());
    }

    #[test]
    fn test_invalid_gain_rejected() {
        let p = BjtParams {
            bf: 0.0,
            ..BjtParams::default()
        };
        assert!(Bjt::with_params(Net(1), Net(2), Net(3), BjtType::Npn, p).is_err());
    }

    #[test]
    fn test_pnp_flips_junction_coupling() {
        let mut npn = Bjt::new(Net(1), Net(2), Net(3), BjtType::Npn);
        let mut pnp = Bjt::new(Net(1), Net(2), Net(3), BjtType::Pnp);
        let mut sys_n = MnaSystem::new(8);
        let mut sys_p = MnaSystem::new(8);
        let (mut next_n, mut next_p) = (4, 4);
        npn.nets.claim(&mut next_n);
        pnp.nets.claim(&mut next_p);
        npn.stamp(&mut sys_n);
        pnp.stamp(&mut sys_p);

        let (vbc, ibc) = (Net(4), Net(6));
        assert_eq!(sys_n.cell(ibc, vbc).g, 1.0);
        assert_eq!(sys_p.cell(ibc, vbc).g, -1.0);
        assert_eq!(sys_n.cell(vbc, ibc).g, -1.0);
        assert_eq!(sys_p.cell(vbc, ibc).g, 1.0);
        // transport terms do not depend on polarity
        assert_eq!(sys_n.cell(Net(2), Net(7)).g, sys_p.cell(Net(2), Net(7)).g);
        assert_eq!(sys_p.net_info(vbc).name, "v:Q:1,2,3:cb");
    }
}
