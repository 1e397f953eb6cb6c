//! Building a simulatable netlist from a parsed DSL file.

use std::collections::HashMap;

use super::types::{DeviceId, Net};
use crate::components::Device;
use crate::dsl::{is_ground, CircuitAst, TranDef};
use crate::error::{Result, SimError};
use crate::solver::{Netlist, SolverConfig};

/// A parsed circuit: the netlist plus the names it was written with.
#[derive(Debug)]
pub struct Circuit {
    /// The netlist, not yet finalized
    pub netlist: Netlist,

    /// Mapping from node names to nets
    pub node_map: HashMap<String, Net>,

    /// Reverse mapping from node nets to names
    pub node_names: Vec<String>,

    /// Element names and their device handles, in source order
    pub elements: Vec<(String, DeviceId)>,

    /// Transient analysis requested by the file
    pub tran: Option<TranDef>,

    /// Skip the DC operating point
    pub no_dc: bool,
}

impl Circuit {
    /// Build a circuit from a parsed AST.
    ///
    /// Ground is node 0; the remaining nodes are numbered in order of first
    /// appearance.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut node_map = HashMap::new();
        let mut node_names = vec!["0".to_string()];
        node_map.insert("0".to_string(), Net::GROUND);
        for name in &ast.nodes {
            node_map.insert(name.clone(), Net(node_names.len()));
            node_names.push(name.clone());
        }

        let mut config = SolverConfig::default();
        if let Some(max_iterations) = ast.options.max_iterations {
            config = config.with_max_iterations(max_iterations);
        }
        if let Some(tolerance) = ast.options.tolerance {
            config = config.with_tolerance(tolerance);
        }

        let mut netlist = Netlist::with_config(node_names.len(), config);
        let mut elements = Vec::with_capacity(ast.elements.len());

        for def in &ast.elements {
            let pins = def
                .nodes
                .iter()
                .map(|name| {
                    node_map.get(name).copied().ok_or_else(|| {
                        let message = format!("unknown node '{}'", name);
                        SimError::invalid_component(&def.name, def.line, message)
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let model = match &def.model_ref {
                Some(name) => {
                    let model = ast.models.get(name).ok_or_else(|| SimError::UndefinedModel {
                        model: name.clone(),
                        component: def.name.clone(),
                    })?;
                    if model.model_type.element_kind() != def.kind {
                        return Err(SimError::invalid_component(
                            &def.name,
                            def.line,
                            format!("model '{}' is a {} model", name, model.model_type),
                        ));
                    }
                    Some(model)
                }
                None => None,
            };

            let device = Device::from_def(def, &pins, model)?;
            let id = netlist.add(device)?;
            elements.push((def.name.clone(), id));
        }

        Ok(Circuit {
            netlist,
            node_map,
            node_names,
            elements,
            tran: ast.tran,
            no_dc: ast.no_dc,
        })
    }

    /// Parse netlist text and build the circuit.
    pub fn from_source(input: &str) -> Result<Self> {
        Self::from_ast(crate::dsl::parse(input)?)
    }

    /// Number of circuit nodes, ground included.
    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Find a node by name. `0` and `GND` are ground.
    pub fn find_node(&self, name: &str) -> Option<Net> {
        if is_ground(name) {
            return Some(Net::GROUND);
        }
        self.node_map.get(name).copied()
    }

    /// Get the name of a circuit node.
    pub fn node_name(&self, net: Net) -> Option<&str> {
        self.node_names.get(net.0).map(String::as_str)
    }

    /// Find an element's device by name.
    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        self.elements.iter().find(|(n, _)| n == name).map(|&(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_numbering() {
        let c = Circuit::from_source("V1 top 0 12\nR1 top mid 200k\nR2 mid GND 100k").unwrap();
        assert_eq!(c.node_count(), 3);
        assert_eq!(c.find_node("top"), Some(Net(1)));
        assert_eq!(c.find_node("mid"), Some(Net(2)));
        assert_eq!(c.find_node("gnd"), Some(Net::GROUND));
        assert_eq!(c.node_name(Net(2)), Some("mid"));
        assert_eq!(c.device_id("R2"), Some(DeviceId(2)));
        // one internal net for the source branch
        assert_eq!(c.netlist.net_count(), 4);
    }

    #[test]
    fn test_options_reach_the_netlist() {
        let c = Circuit::from_source(".options maxiter=7 vtol=1e-6\nR1 a 0 1k").unwrap();
        assert_eq!(c.netlist.config().max_iterations, 7);
        assert_eq!(c.netlist.config().tolerance, 1e-6);
    }

    #[test]
    fn test_model_resolution() {
        let c = Circuit::from_source(".model Q2 PNP (bf=50)\nQ1 b c e Q2\nR1 b 0 1k").unwrap();
        match c.netlist.device(c.device_id("Q1").unwrap()) {
            Some(Device::Bjt(q)) => assert_eq!(q.params.bf, 50.0),
            other => panic!("expected a bjt, got {:?}", other),
        }
    }

    #[test]
    fn test_model_errors() {
        assert!(matches!(
            Circuit::from_source("D1 a 0 NOPE"),
            Err(SimError::UndefinedModel { .. })
        ));
        assert!(matches!(
            Circuit::from_source(".model X NPN\nD1 a 0 X"),
            Err(SimError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected_with_name() {
        match Circuit::from_source("V1 a 0 1\nR1 a 0 0") {
            Err(SimError::InvalidComponent { name, line, .. }) => {
                assert_eq!(name, "R1");
                assert_eq!(line, 2);
            }
            other => panic!("expected invalid component, got {:?}", other),
        }
    }
}
