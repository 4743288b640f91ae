//! Interconnect components: Switch and Wire.

use crate::solver::MIN_RESISTANCE;

/// A switch component.
///
/// An open switch is removed from the active branch list for the sub-step.
/// A closed switch solves exactly like an ideal wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub closed: bool,
}

impl Switch {
    /// Create a new switch.
    pub fn new(closed: bool) -> Self {
        Self { closed }
    }

    /// Set the switch state.
    pub fn set_state(&mut self, closed: bool) {
        self.closed = closed;
    }
}

/// A wire.
///
/// Wires are ideal (zero resistance) unless given a resistivity-derived
/// resistance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wire {
    /// Resistance in ohms; zero for an ideal wire
    pub resistance: f64,
}

impl Wire {
    /// Create an ideal wire.
    pub fn ideal() -> Self {
        Self { resistance: 0.0 }
    }

    /// Create a wire with the given resistance.
    pub fn with_resistance(resistance: f64) -> Self {
        Self { resistance }
    }

    /// Whether the wire is solved as a zero-volt source.
    pub fn is_ideal(&self) -> bool {
        self.resistance < MIN_RESISTANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_state() {
        let mut s = Switch::new(false);
        s.set_state(true);
        assert!(s.closed);
        s.set_state(false);
        assert!(!s.closed);
    }

    #[test]
    fn test_wire_ideal() {
        assert!(Wire::ideal().is_ideal());
        assert!(Wire::default().is_ideal());
        assert!(!Wire::with_resistance(0.01).is_ideal());
    }
}
