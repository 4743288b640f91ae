//! Parser for the netlist language.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, VoltaicError};

/// Every branch connects exactly two nodes.
const BRANCH_TERMINALS: usize = 2;

/// Parser for netlists.
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

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {}
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    for node in &component.nodes {
                        ast.declare_node(node);
                    }
                    ast.components.push(component);
                }
                _ => {
                    return Err(VoltaicError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            // Consume newline or EOF
            if self.current.kind == TokenKind::Newline {
                self.advance()?;
            } else if self.current.kind != TokenKind::Eof {
                return Err(VoltaicError::parse(
                    self.current.line,
                    format!("trailing token: {:?}", self.current.text),
                ));
            }
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".node" => {
                if self.at_line_end() {
                    return Err(VoltaicError::parse(line, ".node requires at least one name"));
                }
                while !self.at_line_end() {
                    match self.current.kind {
                        TokenKind::Identifier | TokenKind::Number => {
                            ast.declare_node(&self.current.text);
                            self.advance()?;
                        }
                        _ => {
                            return Err(VoltaicError::parse(
                                line,
                                format!("invalid node name {:?}", self.current.text),
                            ));
                        }
                    }
                }
                Ok(())
            }
            _ => Err(VoltaicError::parse(
                line,
                format!("unknown directive: {}", directive),
            )),
        }
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let component_type =
            ComponentType::from_name(&name).ok_or_else(|| VoltaicError::UnsupportedBranchType {
                component_type: name.clone(),
                line,
            })?;

        let expected_nodes = BRANCH_TERMINALS;
        let mut nodes = Vec::with_capacity(expected_nodes);
        let mut value = None;
        let mut params = HashMap::new();
        let mut flags = Vec::new();

        // Node names come first; either identifiers or bare numbers like "0"
        while nodes.len() < expected_nodes && !self.at_line_end() {
            match self.current.kind {
                TokenKind::Identifier | TokenKind::Number => {
                    nodes.push(self.current.text.clone());
                    self.advance()?;
                }
                _ => break,
            }
        }

        if nodes.len() < expected_nodes {
            return Err(VoltaicError::invalid_component(
                &name,
                line,
                format!("expected {} nodes, got {}", expected_nodes, nodes.len()),
            ));
        }

        while !self.at_line_end() {
            let text = self.current.text.clone();
            match self.current.kind {
                TokenKind::Number if value.is_none() => {
                    value = parse_value(&text);
                    self.advance()?;
                }
                TokenKind::Identifier => {
                    self.advance()?;
                    if self.current.kind == TokenKind::Equals {
                        self.advance()?;
                        let param = self.parse_param_value(&name, line, &text)?;
                        params.insert(text.to_lowercase(), param);
                    } else {
                        flags.push(text.to_lowercase());
                    }
                }
                _ => {
                    return Err(VoltaicError::invalid_component(
                        &name,
                        line,
                        format!("unexpected {:?}", text),
                    ));
                }
            }
        }

        Ok(ComponentDef {
            component_type,
            name,
            nodes,
            value,
            params,
            flags,
            line,
        })
    }

    fn parse_param_value(&mut self, component: &str, line: usize, param: &str) -> Result<f64> {
        if self.current.kind != TokenKind::Number {
            return Err(VoltaicError::invalid_component(
                component,
                line,
                format!("parameter '{}' expects a number", param),
            ));
        }
        let v = parse_value(&self.current.text).ok_or_else(|| {
            VoltaicError::parse(line, format!("invalid number: {}", self.current.text))
        })?;
        self.advance()?;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_parse_battery_and_resistor() {
        let ast = parse("B1 0 a 12\nR1 a 0 4 len=2\n").unwrap();
        assert_eq!(ast.components.len(), 2);
        assert_eq!(ast.components[0].component_type, ComponentType::Battery);
        assert_eq!(ast.components[0].nodes, vec!["0", "a"]);
        assert_eq!(ast.components[0].value, Some(12.0));
        assert_eq!(ast.components[1].length(), Some(2.0));
        assert_eq!(ast.nodes, vec!["0", "a"]);
    }

    #[test]
    fn test_parse_switch_flags() {
        let ast = parse("SW1 a b open").unwrap();
        let sw = &ast.components[0];
        assert_eq!(sw.component_type, ComponentType::Switch);
        assert!(sw.has_flag("open"));
        assert_eq!(sw.value, None);
    }

    #[test]
    fn test_parse_node_directive() {
        let ast = parse(".node spare other\nW1 a b").unwrap();
        assert_eq!(ast.nodes, vec!["spare", "other", "a", "b"]);
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# 12V loop\nB1 0 a 12 ; the cell\n\n  R1 a 0 4k # load\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.components.len(), 2);
        assert_eq!(ast.components[1].value, Some(4000.0));
    }

    #[test]
    fn test_unsupported_branch_type() {
        let err = parse("D1 a 0").unwrap_err();
        assert!(matches!(
            err,
            VoltaicError::UnsupportedBranchType { line: 1, .. }
        ));
    }

    #[test]
    fn test_missing_nodes() {
        let err = parse("R1 a\n").unwrap_err();
        assert!(matches!(err, VoltaicError::InvalidComponent { .. }));
    }

    #[test]
    fn test_second_number_rejected() {
        let err = parse("R1 a b 4 5").unwrap_err();
        assert!(matches!(err, VoltaicError::InvalidComponent { .. }));
    }
}
