//! Abstract Syntax Tree types for the netlist language.

use std::collections::HashMap;

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// All branch definitions, in file order
    pub components: Vec<ComponentDef>,
    /// All node names, in order of first appearance
    pub nodes: Vec<String>,
}

impl CircuitAst {
    /// Create a new empty circuit AST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node name if it has not been seen yet.
    pub fn declare_node(&mut self, name: &str) {
        if !self.nodes.iter().any(|n| n == name) {
            self.nodes.push(name.to_string());
        }
    }
}

/// A branch definition from the netlist.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    /// Component type (B, R, C, L, I, W, SW)
    pub component_type: ComponentType,
    /// Unique branch name
    pub name: String,
    /// Start and end node names
    pub nodes: Vec<String>,
    /// Primary value (voltage, resistance, capacitance, ...)
    pub value: Option<f64>,
    /// `key=value` parameters, keys lowercased
    pub params: HashMap<String, f64>,
    /// Bare keywords such as `open` or `closed`, lowercased
    pub flags: Vec<String>,
    /// Source line number for error reporting
    pub line: usize,
}

impl ComponentDef {
    /// Whether the bare keyword `flag` appeared on the line.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Branch length given by `len=`, if any.
    pub fn length(&self) -> Option<f64> {
        self.params.get("len").copied()
    }
}

/// Branch types supported by the netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// Battery (ideal voltage source)
    Battery,
    /// Resistor
    Resistor,
    /// Capacitor
    Capacitor,
    /// Inductor
    Inductor,
    /// Current Source
    CurrentSource,
    /// Switch
    Switch,
    /// Wire
    Wire,
}

impl ComponentType {
    /// Parse a component type from the leading characters of a branch name.
    ///
    /// `SW` is checked before the single-character prefixes.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.starts_with("SW") {
            return Some(Self::Switch);
        }
        match upper.chars().next()? {
            'B' | 'V' => Some(Self::Battery),
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'I' => Some(Self::CurrentSource),
            'W' => Some(Self::Wire),
            _ => None,
        }
    }
}
