//! Parser for the netlist DSL.

use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, SimError};

/// Names that refer to the ground node.
pub fn is_ground(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}

/// Parser for netlist DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire netlist.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();
        let mut seen_nodes = HashSet::new();
        let mut seen_names = HashSet::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let element = self.parse_element()?;
                    if !seen_names.insert(element.name.clone()) {
                        return Err(SimError::DuplicateComponent { name: element.name });
                    }
                    for node in &element.nodes {
                        if !is_ground(node) && seen_nodes.insert(node.clone()) {
                            ast.nodes.push(node.clone());
                        }
                    }
                    ast.elements.push(element);
                }
                _ => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            self.end_of_line()?;
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(SimError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => self.advance(),
            TokenKind::Eof => Ok(()),
            _ => Err(SimError::parse(
                self.current.line,
                format!("unexpected trailing token: {:?}", self.current.text),
            )),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| SimError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// `key=value` pairs up to the end of the line or a closing paren.
    fn key_values(&mut self) -> Result<Vec<(String, f64, usize)>> {
        let mut pairs = Vec::new();
        while self.current.kind == TokenKind::Identifier {
            let key = self.current.text.to_lowercase();
            let line = self.current.line;
            self.advance()?;
            self.expect(TokenKind::Equals)?;
            pairs.push((key, self.number()?, line));
        }
        Ok(pairs)
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".model" => {
                let model = self.parse_model_def(line)?;
                if ast.models.contains_key(&model.name) {
                    return Err(SimError::DuplicateModel { name: model.name });
                }
                ast.models.insert(model.name.clone(), model);
            }
            ".tran" => {
                let step = self.number()?;
                if !(step.is_finite() && step > 0.0) {
                    return Err(SimError::parse(
                        line,
                        format!("time step must be positive, got {}", step),
                    ));
                }
                let ticks = self.number()?;
                if !(ticks.is_finite() && ticks >= 0.0 && ticks.fract() == 0.0) {
                    return Err(SimError::parse(
                        line,
                        format!("tick count must be a non-negative integer, got {}", ticks),
                    ));
                }
                ast.tran = Some(TranDef {
                    step,
                    ticks: ticks as usize,
                });
            }
            ".options" => {
                for (key, value, line) in self.key_values()? {
                    match key.as_str() {
                        "maxiter" => {
                            if !(value >= 1.0 && value.fract() == 0.0) {
                                return Err(SimError::parse(
                                    line,
                                    format!("maxiter must be a positive integer, got {}", value),
                                ));
                            }
                            ast.options.max_iterations = Some(value as usize);
                        }
                        "vtol" => {
                            if !(value.is_finite() && value > 0.0) {
                                return Err(SimError::parse(
                                    line,
                                    format!("vtol must be positive, got {}", value),
                                ));
                            }
                            ast.options.tolerance = Some(value);
                        }
                        _ => {
                            return Err(SimError::parse(line, format!("unknown option: {}", key)))
                        }
                    }
                }
            }
            ".nodc" => ast.no_dc = true,
            _ => {
                return Err(SimError::parse(line, format!("unknown directive: {}", directive)));
            }
        }

        Ok(())
    }

    fn parse_model_def(&mut self, line: usize) -> Result<ModelDef> {
        let name = self.expect(TokenKind::Identifier)?.text;
        let type_str = self.expect(TokenKind::Identifier)?.text;

        let model_type = ModelType::from_keyword(&type_str)
            .ok_or_else(|| SimError::parse(line, format!("unknown model type: {}", type_str)))?;

        // Parameters, optionally in parentheses: (param=value param2=value2)
        let parens = self.current.kind == TokenKind::OpenParen;
        if parens {
            self.advance()?;
        }
        let params: HashMap<String, f64> = self
            .key_values()?
            .into_iter()
            .map(|(k, v, _)| (k, v))
            .collect();
        if parens {
            self.expect(TokenKind::CloseParen)?;
        }

        Ok(ModelDef {
            name,
            model_type,
            params,
            line,
        })
    }

    fn parse_element(&mut self) -> Result<ElementDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let first_char = name.chars().next().unwrap_or('?');
        let kind =
            ElementKind::from_prefix(first_char).ok_or_else(|| SimError::UnknownComponentType {
                component_type: name.clone(),
                line,
            })?;

        let expected_nodes = kind.expected_node_count();
        let mut nodes = Vec::with_capacity(expected_nodes);
        while nodes.len() < expected_nodes {
            match self.current.kind {
                TokenKind::Identifier | TokenKind::Number => {
                    let text = self.current.text.clone();
                    self.advance()?;
                    nodes.push(if is_ground(&text) { "0".to_string() } else { text });
                }
                _ => {
                    return Err(SimError::invalid_component(
                        &name,
                        line,
                        format!("expected {} nodes, got {}", expected_nodes, nodes.len()),
                    ));
                }
            }
        }

        let mut element = ElementDef {
            kind,
            name,
            nodes,
            value: None,
            waveform: None,
            model_ref: None,
            line,
        };

        if kind.takes_value() {
            if self.current.kind != TokenKind::Number {
                return Err(SimError::invalid_component(
                    &element.name,
                    line,
                    format!("{} requires a value", kind),
                ));
            }
            element.value = Some(self.number()?);
        } else if kind == ElementKind::FunctionSource {
            element.waveform = Some(self.parse_waveform(&element.name, line)?);
        } else if kind.takes_model() && self.current.kind == TokenKind::Identifier {
            element.model_ref = Some(self.current.text.clone());
            self.advance()?;
        }

        Ok(element)
    }

    /// `<value>` or `KEYWORD(arg ...)`.
    fn parse_waveform(&mut self, name: &str, line: usize) -> Result<WaveformDef> {
        match self.current.kind {
            TokenKind::Number => Ok(WaveformDef::Dc(self.number()?)),
            TokenKind::Identifier => {
                let keyword = self.current.text.clone();
                self.advance()?;
                self.expect(TokenKind::OpenParen)?;
                let mut args = Vec::new();
                while self.current.kind == TokenKind::Number {
                    args.push(self.number()?);
                }
                self.expect(TokenKind::CloseParen)?;
                WaveformDef::from_keyword(&keyword, args).ok_or_else(|| {
                    let message = format!("unknown waveform: {}", keyword);
                    SimError::invalid_component(name, line, message)
                })
            }
            _ => Err(SimError::invalid_component(
                name,
                line,
                "function source requires a waveform",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 in out 10k").unwrap();
        assert_eq!(ast.elements.len(), 1);
        assert_eq!(ast.elements[0].kind, ElementKind::Resistor);
        assert_eq!(ast.elements[0].name, "R1");
        assert_eq!(ast.elements[0].nodes, vec!["in", "out"]);
        assert_eq!(ast.elements[0].value, Some(10_000.0));
    }

    #[test]
    fn test_nodes_in_order_of_appearance() {
        let ast = parse("V1 top GND 12\nR1 top 2 200k\nR2 2 0 100k\n").unwrap();
        assert_eq!(ast.nodes, vec!["top", "2"]);
        assert_eq!(ast.elements[0].nodes, vec!["top", "0"]);
    }

    #[test]
    fn test_parse_model() {
        let ast = parse(".model DCLIP D (is=1e-14 n=1.8)").unwrap();
        let model = &ast.models["DCLIP"];
        assert_eq!(model.model_type, ModelType::Diode);
        assert!((model.params["is"] - 1e-14).abs() < 1e-20);
        assert_eq!(model.params["n"], 1.8);
    }

    #[test]
    fn test_parse_model_without_parens() {
        let ast = parse(".model Q1 PNP bf=100").unwrap();
        assert_eq!(ast.models["Q1"].model_type, ModelType::Pnp);
        assert_eq!(ast.models["Q1"].params["bf"], 100.0);
    }

    #[test]
    fn test_parse_devices_with_models() {
        let ast = parse("D1 a 0 DCLIP\nQ1 b c e\nP1 a b").unwrap();
        assert_eq!(ast.elements[0].model_ref.as_deref(), Some("DCLIP"));
        assert_eq!(ast.elements[1].nodes.len(), 3);
        assert_eq!(ast.elements[1].model_ref, None);
        assert_eq!(ast.elements[2].kind, ElementKind::Probe);
    }

    #[test]
    fn test_parse_waveforms() {
        let ast = parse("F1 in 0 SIN(0 1 1k)\nF2 a 0 2.5\nF3 b 0 STEP(0 5 1m)").unwrap();
        assert_eq!(ast.elements[0].waveform, Some(WaveformDef::Sin(vec![0.0, 1.0, 1000.0])));
        assert_eq!(ast.elements[1].waveform, Some(WaveformDef::Dc(2.5)));
        assert_eq!(ast.elements[2].waveform, Some(WaveformDef::Step(vec![0.0, 5.0, 1e-3])));
    }

    #[test]
    fn test_parse_directives() {
        let ast = parse(".tran 10u 500\n.options maxiter=50 vtol=1e-6\n.nodc\n").unwrap();
        let tran = ast.tran.unwrap();
        assert_relative_eq!(tran.step, 10e-6);
        assert_eq!(tran.ticks, 500);
        assert_eq!(ast.options.max_iterations, Some(50));
        assert_eq!(ast.options.tolerance, Some(1e-6));
        assert!(ast.no_dc);
    }

    #[test]
    fn test_parse_with_comments() {
        let ast = parse("# This is a comment\nR1 in out 1k ; inline comment style\n").unwrap();
        assert_eq!(ast.elements.len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse("X1 a b 1k"), Err(SimError::UnknownComponentType { line: 1, .. })));
        assert!(matches!(parse("R1 a 0 1k\nR1 a 0 2k"), Err(SimError::DuplicateComponent { .. })));
        assert!(matches!(
            parse(".model A D\n.model A D"),
            Err(SimError::DuplicateModel { .. })
        ));
        assert!(matches!(parse("R1 a\n"), Err(SimError::InvalidComponent { .. })));
        assert!(matches!(parse("R1 a b\n"), Err(SimError::InvalidComponent { .. })));
        assert!(matches!(parse("R1 a b 1k 2k"), Err(SimError::ParseError { line: 1, .. })));
        assert!(matches!(parse(".bogus"), Err(SimError::ParseError { .. })));
        assert!(matches!(parse(".tran 0 10"), Err(SimError::ParseError { .. })));
        assert!(matches!(parse(".options speed=2"), Err(SimError::ParseError { .. })));
        assert!(matches!(parse("F1 a 0 WOBBLE(1)"), Err(SimError::InvalidComponent { .. })));
    }
}
