//! Component models for circuit simulation.
//!
//! This module provides models for all supported branch elements:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Battery, Current Source
//! - Interconnect: Switch, Wire
//!
//! The set is closed. The companion model builder dispatches over
//! [`Component`] with an exhaustive `match`, so adding a variant without
//! teaching the solver about it fails to compile.

mod controls;
mod linear;
mod sources;

pub use controls::{Switch, Wire};
pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{Battery, CurrentSource};

use std::fmt;

use crate::dsl::{ComponentDef, ComponentType};
use crate::error::{Result, VoltaicError};

/// A circuit component carried by a branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Battery(Battery),
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Switch(Switch),
    Wire(Wire),
    CurrentSource(CurrentSource),
}

impl Component {
    /// Create a component from a netlist definition.
    pub fn from_def(def: &ComponentDef) -> Result<Self> {
        let required = |what: &str| {
            def.value.ok_or_else(|| {
                VoltaicError::invalid_component(
                    &def.name,
                    def.line,
                    format!("{} requires a value", what),
                )
            })
        };

        match def.component_type {
            ComponentType::Battery => Ok(Component::Battery(Battery::new(required("battery")?))),

            ComponentType::Resistor => Ok(Component::Resistor(Resistor::new(required("resistor")?))),

            ComponentType::Capacitor => {
                let capacitance = required("capacitor")?;
                let v0 = def.params.get("v0").copied().unwrap_or(0.0);
                Ok(Component::Capacitor(Capacitor::with_voltage(capacitance, v0)))
            }

            ComponentType::Inductor => {
                let mut inductor = Inductor::new(required("inductor")?);
                inductor.current = def.params.get("i0").copied().unwrap_or(0.0);
                Ok(Component::Inductor(inductor))
            }

            ComponentType::CurrentSource => Ok(Component::CurrentSource(CurrentSource::new(
                required("current source")?,
            ))),

            ComponentType::Switch => {
                // Keyword form wins over state=0|1; a bare switch starts closed
                let closed = if def.has_flag("open") {
                    false
                } else if def.has_flag("closed") {
                    true
                } else {
                    def.params.get("state").map(|v| *v > 0.5).unwrap_or(true)
                };
                Ok(Component::Switch(Switch::new(closed)))
            }

            ComponentType::Wire => {
                let resistance = def
                    .value
                    .or_else(|| def.params.get("r").copied())
                    .unwrap_or(0.0);
                Ok(Component::Wire(Wire::with_resistance(resistance)))
            }
        }
    }

    /// Short lowercase name of the component kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Battery(_) => "battery",
            Component::Resistor(_) => "resistor",
            Component::Capacitor(_) => "capacitor",
            Component::Inductor(_) => "inductor",
            Component::Switch(_) => "switch",
            Component::Wire(_) => "wire",
            Component::CurrentSource(_) => "current source",
        }
    }

    /// Whether this component carries state between sub-steps.
    pub fn is_energy_storage(&self) -> bool {
        matches!(self, Component::Capacitor(_) | Component::Inductor(_))
    }

    /// Energy held by a capacitor or inductor; zero for everything else.
    pub fn stored_energy(&self) -> f64 {
        match self {
            Component::Capacitor(c) => c.stored_energy(),
            Component::Inductor(l) => l.stored_energy(),
            _ => 0.0,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Battery(b) => write!(f, "battery {} V", b.voltage),
            Component::Resistor(r) => write!(f, "resistor {} Ω", r.resistance),
            Component::Capacitor(c) => write!(f, "capacitor {} F", c.capacitance),
            Component::Inductor(l) => write!(f, "inductor {} H", l.inductance),
            Component::Switch(s) => write!(f, "switch ({})", if s.closed { "closed" } else { "open" }),
            Component::Wire(w) if w.is_ideal() => write!(f, "wire"),
            Component::Wire(w) => write!(f, "wire {} Ω", w.resistance),
            Component::CurrentSource(i) => write!(f, "current source {} A", i.current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn def(component_type: ComponentType, value: Option<f64>) -> ComponentDef {
        ComponentDef {
            component_type,
            name: "X1".to_string(),
            nodes: vec!["a".to_string(), "b".to_string()],
            value,
            params: HashMap::new(),
            flags: Vec::new(),
            line: 1,
        }
    }

    #[test]
    fn test_from_def_requires_value() {
        let err = Component::from_def(&def(ComponentType::Resistor, None)).unwrap_err();
        assert!(matches!(err, VoltaicError::InvalidComponent { .. }));
    }

    #[test]
    fn test_switch_state_from_flags() {
        let mut d = def(ComponentType::Switch, None);
        assert_eq!(Component::from_def(&d).unwrap(), Component::Switch(Switch::new(true)));

        d.flags.push("open".to_string());
        assert_eq!(Component::from_def(&d).unwrap(), Component::Switch(Switch::new(false)));
    }

    #[test]
    fn test_capacitor_initial_voltage() {
        let mut d = def(ComponentType::Capacitor, Some(0.1));
        d.params.insert("v0".to_string(), 5.0);
        match Component::from_def(&d).unwrap() {
            Component::Capacitor(c) => assert_eq!(c.voltage, 5.0),
            other => panic!("unexpected component {:?}", other),
        }
    }
}
