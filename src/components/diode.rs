//! Diode model.
//!
//! A [`PnJunction`] in series with a resistance `rs`. The diode carries two
//! internal unknowns: the junction voltage and the diode current.
//!
//! ```text
//!        a    b    v    i
//!   a  |               +1 |
//!   b  |               -1 |
//!   v  |          gm   -1 | = i0
//!   i  | -1   +1   +1  rs |
//! ```
//!
//! Row `i` gives `v = va - vb - rs*i`, row `v` gives `i = gm*v - i0`, the
//! companion of the junction law.

use crate::circuit::{Net, NetKind};
use crate::dsl::{ModelDef, ModelType};
use crate::error::{Result, SimError};
use crate::solver::MnaSystem;

use super::junction::{JunctionSlots, PnJunction};
use super::NetMap;

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Series resistance in ohms
    pub rs: f64,
    /// Saturation current (Is)
    pub is: f64,
    /// Ideality factor (n)
    pub n: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            rs: 10.0,
            is: 35e-12,
            n: 1.24,
        }
    }
}

impl DiodeParams {
    /// Create parameters from a model definition. Missing keys keep their
    /// defaults.
    pub fn from_model(model: &ModelDef) -> Result<Self> {
        if model.model_type != ModelType::Diode {
            return Err(SimError::InvalidParameter {
                component: model.name.clone(),
                param: "type".to_string(),
                message: format!("expected a D model, got {}", model.model_type),
            });
        }

        let mut params = Self::default();
        if let Some(&rs) = model.params.get("rs") {
            params.rs = rs;
        }
        if let Some(&is) = model.params.get("is") {
            params.is = is;
        }
        if let Some(&n) = model.params.get("n") {
            params.n = n;
        }
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if !(self.rs.is_finite() && self.rs >= 0.0) {
            return Err(SimError::invalid_parameter(
                "diode",
                "rs",
                format!("must be >= 0, got {}", self.rs),
            ));
        }
        if !(self.is.is_finite() && self.is > 0.0) {
            return Err(SimError::invalid_parameter(
                "diode",
                "is",
                format!("must be > 0, got {}", self.is),
            ));
        }
        if !(self.n.is_finite() && self.n > 0.0) {
            return Err(SimError::invalid_parameter(
                "diode",
                "n",
                format!("must be > 0, got {}", self.n),
            ));
        }
        Ok(())
    }
}

/// A diode component, anode `a` to cathode `b`.
#[derive(Debug, Clone)]
pub struct Diode {
    pub params: DiodeParams,
    pub(super) nets: NetMap<2, 2>,
    pn: PnJunction,
    slots: Option<JunctionSlots>,
}

impl Diode {
    /// Create a diode with default parameters.
    pub fn new(a: Net, b: Net) -> Self {
        let params = DiodeParams::default();
        Self {
            pn: PnJunction::new(params.is, params.n),
            params,
            nets: NetMap::new([a, b]),
            slots: None,
        }
    }

    /// Create a diode with custom parameters.
    pub fn with_params(a: Net, b: Net, params: DiodeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            pn: PnJunction::new(params.is, params.n),
            params,
            nets: NetMap::new([a, b]),
            slots: None,
        })
    }

    /// Pin nets.
    pub fn pins(&self) -> &[Net] {
        self.nets.pins()
    }

    /// Internal net holding the junction voltage.
    pub fn junction_net(&self) -> Net {
        self.nets.internal(0)
    }

    /// Internal net holding the diode current, anode to cathode.
    pub fn current_net(&self) -> Net {
        self.nets.internal(1)
    }

    /// The junction and its present linearization.
    pub fn junction(&self) -> &PnJunction {
        &self.pn
    }

    pub fn stamp(&mut self, system: &mut MnaSystem) {
        let (a, b) = (self.nets.pin(0), self.nets.pin(1));
        let (v, i) = (self.junction_net(), self.current_net());

        system.stamp_static(-1.0, i, a, "-1");
        system.stamp_static(1.0, i, b, "+1");
        system.stamp_static(1.0, i, v, "+1");

        system.stamp_static(1.0, a, i, "+1");
        system.stamp_static(-1.0, b, i, "-1");
        system.stamp_static(-1.0, v, i, "-1");

        system.stamp_static(self.params.rs, i, i, "rs:pn");

        let pins = format!("{},{}", a.0, b.0);
        self.slots = Some(JunctionSlots::bind(
            &self.pn,
            system,
            v,
            "gm:D",
            &format!("i0:D:{}", pins),
        ));

        system.describe_net(v, format!("v:D:{}", pins), NetKind::Voltage, 1.0);
        system.describe_net(i, format!("i:D:{}", pins), NetKind::Current, 1.0);
    }

    pub fn newton(&mut self, system: &mut MnaSystem, tolerance: f64) -> bool {
        let done = self.pn.newton(system.solution(self.junction_net()), tolerance);
        if let Some(slots) = &self.slots {
            slots.publish(&self.pn, system);
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn model(model_type: ModelType, params: &[(&str, f64)]) -> ModelDef {
        ModelDef {
            name: "DX".to_string(),
            model_type,
            params: params.iter().map(|&(k, v)| (k.to_string(), v)).collect::<HashMap<_, _>>(),
            line: 1,
        }
    }

    #[test]
    fn test_params_from_model() {
        let m = model(ModelType::Diode, &[("is", 1e-14), ("rs", 0.0)]);
        let p = DiodeParams::from_model(&m).unwrap();
        assert_eq!(p.is, 1e-14);
        assert_eq!(p.rs, 0.0);
        assert_eq!(p.n, 1.24);
    }

    #[test]
    fn test_params_reject_wrong_model_type() {
        assert!(DiodeParams::from_model(&model(ModelType::Npn, &[])).is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = DiodeParams {
            is: 0.0,
            ..DiodeParams::default()
        };
        assert!(Diode::with_params(Net(1), Net(0), bad).is_err());
        let bad = DiodeParams {
            rs: -1.0,
            ..DiodeParams::default()
        };
        assert!(Diode::with_params(Net(1), Net(0), bad).is_err());
    }

    #[test]
    fn test_stamp_layout() {
        let mut d = Diode::new(Net(1), Net(0));
        let mut next = 2;
        d.nets.claim(&mut next);
        let mut sys = MnaSystem::new(4);
        d.stamp(&mut sys);
        let (v, i) = (d.junction_net(), d.current_net());
        assert_eq!(sys.cell(i, i).g, 10.0);
        assert_eq!(sys.cell(i, Net(1)).g, -1.0);
        assert_eq!(sys.cell(v, v).dynamic.len(), 1);
        assert_eq!(sys.rhs(v).dynamic.len(), 1);
        assert_eq!(sys.net_info(i).kind, NetKind::Current);
        assert_eq!(sys.net_info(v).name, "v:D:1,0");
    }
}
