//! Netlist language for circuit topologies.
//!
//! A small line-oriented, SPICE-flavoured format for describing the circuits a
//! user builds on screen. Each line is one branch; node names are free-form.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | branch | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = ".node" node { node }
//! branch      = name node node [value] { param | flag }
//! param       = identifier '=' value
//! flag        = identifier
//!
//! name        = type_prefix { letter | digit | '_' }
//! node        = identifier | digits
//! value       = ['-'|'+'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+] [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! # Branch Types
//!
//! | Prefix | Description | Syntax |
//! |--------|-------------|--------|
//! | B, V | Battery | `B<name> <start> <end> <volts>` (end is positive) |
//! | R | Resistor | `R<name> <start> <end> <ohms>` |
//! | C | Capacitor | `C<name> <start> <end> <farads> [v0=<volts>]` |
//! | L | Inductor | `L<name> <start> <end> <henries> [i0=<amps>]` |
//! | I | Current Source | `I<name> <start> <end> <amps>` |
//! | W | Wire | `W<name> <start> <end> [ohms]` |
//! | SW | Switch | `SW<name> <start> <end> [open\|closed]` |
//!
//! Every branch accepts `len=<units>` to set its length for carrier layout.
//!
//! # Example
//!
//! ```text
//! # Flashlight
//! B1   0    pos  9
//! SW1  pos  a    closed
//! R1   a    0    4.5  len=2
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a netlist string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a netlist file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::VoltaicError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
