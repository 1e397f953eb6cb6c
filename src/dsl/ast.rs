//! Abstract Syntax Tree types for the netlist DSL.

use std::collections::HashMap;
use std::fmt;

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// All element instances, in source order
    pub elements: Vec<ElementDef>,
    /// Model definitions
    pub models: HashMap<String, ModelDef>,
    /// Non-ground node names in order of first appearance
    pub nodes: Vec<String>,
    /// Transient analysis request
    pub tran: Option<TranDef>,
    /// Solver overrides
    pub options: OptionsDef,
    /// Skip the DC operating point
    pub no_dc: bool,
}

impl CircuitAst {
    /// Create a new empty circuit AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// An element definition from the DSL.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub kind: ElementKind,
    /// Unique element name, prefix letter included
    pub name: String,
    /// Connected node names; ground is always `"0"`
    pub nodes: Vec<String>,
    /// Element value (resistance, capacitance, voltage)
    pub value: Option<f64>,
    /// Waveform of a function source
    pub waveform: Option<WaveformDef>,
    /// Reference to a model definition
    pub model_ref: Option<String>,
    /// Source line number for error reporting
    pub line: usize,
}

/// Element kinds supported by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Resistor,
    Capacitor,
    VoltageSource,
    FunctionSource,
    Probe,
    Diode,
    Bjt,
}

impl ElementKind {
    /// Parse an element kind from its name's first letter.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'V' => Some(Self::VoltageSource),
            'F' => Some(Self::FunctionSource),
            'P' => Some(Self::Probe),
            'D' => Some(Self::Diode),
            'Q' => Some(Self::Bjt),
            _ => None,
        }
    }

    /// Get the expected number of nodes for this element kind.
    pub fn expected_node_count(&self) -> usize {
        match self {
            Self::Bjt => 3, // base, collector, emitter
            _ => 2,
        }
    }

    /// Whether the element takes a numeric value after its nodes.
    pub fn takes_value(&self) -> bool {
        matches!(self, Self::Resistor | Self::Capacitor | Self::VoltageSource)
    }

    /// Whether the element may name a `.model`.
    pub fn takes_model(&self) -> bool {
        matches!(self, Self::Diode | Self::Bjt)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::VoltageSource => "voltage source",
            Self::FunctionSource => "function source",
            Self::Probe => "probe",
            Self::Diode => "diode",
            Self::Bjt => "bjt",
        };
        f.write_str(s)
    }
}

/// Waveform of a function source, arguments as written.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformDef {
    Dc(f64),
    /// `SIN(offset amplitude freq [phase_deg])`
    Sin(Vec<f64>),
    /// `SQUARE(amplitude freq [duty])`
    Square(Vec<f64>),
    /// `STEP(v0 v1 [t0])`
    Step(Vec<f64>),
    /// `RAMP(slope [t0])`
    Ramp(Vec<f64>),
}

impl WaveformDef {
    /// Build from a waveform keyword and its arguments.
    pub fn from_keyword(keyword: &str, args: Vec<f64>) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "SIN" | "SINE" => Some(Self::Sin(args)),
            "SQUARE" | "SQR" => Some(Self::Square(args)),
            "STEP" => Some(Self::Step(args)),
            "RAMP" => Some(Self::Ramp(args)),
            "DC" if args.len() == 1 => Some(Self::Dc(args[0])),
            _ => None,
        }
    }
}

/// A model definition (for diodes and BJTs).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    /// Model name
    pub name: String,
    /// Model type (D for diode, NPN/PNP for BJT)
    pub model_type: ModelType,
    /// Model parameters, keys lowercased
    pub params: HashMap<String, f64>,
    /// Source line number
    pub line: usize,
}

/// Model types for parameterized components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Diode,
    Npn,
    Pnp,
}

impl ModelType {
    /// Parse a model type keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "D" | "DIODE" => Some(Self::Diode),
            "NPN" => Some(Self::Npn),
            "PNP" => Some(Self::Pnp),
            _ => None,
        }
    }

    /// Element kind the model applies to.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Diode => ElementKind::Diode,
            Self::Npn | Self::Pnp => ElementKind::Bjt,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Diode => "D",
            Self::Npn => "NPN",
            Self::Pnp => "PNP",
        };
        f.write_str(s)
    }
}

/// `.tran <step> <ticks>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranDef {
    pub step: f64,
    pub ticks: usize,
}

/// `.options` overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptionsDef {
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
}
