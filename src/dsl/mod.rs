//! DSL (Domain Specific Language) parser for netlists.
//!
//! This module provides a SPICE-inspired text format for describing
//! circuits. The DSL is line-oriented and human-editable.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | element | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = '.' directive_name { argument }
//! element     = name node+ [value | waveform | model_ref]
//!
//! directive_name = "model" | "tran" | "options" | "nodc"
//! name        = ('R' | 'C' | 'V' | 'F' | 'P' | 'D' | 'Q') { letter | digit | '_' }
//! node        = identifier | integer | "0" | "GND"
//! value       = number [scale_suffix] [unit]
//! waveform    = ("SIN" | "SQUARE" | "STEP" | "RAMP") '(' number* ')'
//! model_ref   = identifier
//!
//! number      = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! scale_suffix = 'f' | 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G' | "meg"
//! ```
//!
//! # Elements
//!
//! | Type | Description | Syntax |
//! |------|-------------|--------|
//! | R | Resistor | `R<name> <a> <b> <value>` |
//! | C | Capacitor | `C<name> <a> <b> <value>` |
//! | V | Voltage Source | `V<name> <+> <-> <value>` |
//! | F | Function Source | `F<name> <+> <-> <value or waveform>` |
//! | P | Probe | `P<name> <+> <->` |
//! | D | Diode | `D<name> <anode> <cathode> [model]` |
//! | Q | BJT | `Q<name> <base> <collector> <emitter> [model]` |
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .model | Define a device model | `.model <name> D\|NPN\|PNP (<k>=<v> ...)` |
//! | .tran | Transient analysis | `.tran <step> <ticks>` |
//! | .options | Solver settings | `.options maxiter=<n> vtol=<v>` |
//! | .nodc | Skip the DC operating point | `.nodc` |
//!
//! # Example
//!
//! ```text
//! # RC low-pass, step response
//! .tran 10u 500
//!
//! FIN  in   0    STEP(0 1)
//! R1   in   out  1k
//! C1   out  0    1u
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::{is_ground, Parser};

use crate::error::{Result, SimError};

/// Parse a netlist string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a netlist file.
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
