//! Linear passive components: Resistor, Capacitor, Inductor.

use crate::solver::MIN_RESISTANCE;

/// A resistor component.
#[derive(Debug, Clone, PartialEq)]
pub struct Resistor {
    /// Resistance in ohms
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(resistance: f64) -> Self {
        Self { resistance }
    }

    /// Whether the resistance is too small to stamp as a conductance.
    ///
    /// Such resistors are solved as zero-volt sources with their own current
    /// unknown instead.
    pub fn is_short(&self) -> bool {
        self.resistance < MIN_RESISTANCE
    }
}

/// A capacitor component.
///
/// Discretized with backward Euler. From `i = C dv/dt`:
///   i(n) = (C/dt) * v(n) - (C/dt) * v(n-1)
///
/// which is a resistor `R_eq = dt/C` in parallel with a history current
/// source of `C * v(n-1) / dt` driving current from the end node back to the
/// start node.
#[derive(Debug, Clone, PartialEq)]
pub struct Capacitor {
    /// Capacitance in farads
    pub capacitance: f64,

    // State carried between sub-steps
    /// Voltage across the capacitor after the last sub-step
    pub voltage: f64,
    /// Current through the capacitor during the last sub-step
    pub current: f64,
}

impl Capacitor {
    /// Create a new, discharged capacitor.
    pub fn new(capacitance: f64) -> Self {
        Self {
            capacitance,
            voltage: 0.0,
            current: 0.0,
        }
    }

    /// Create a capacitor pre-charged to `voltage`.
    pub fn with_voltage(capacitance: f64, voltage: f64) -> Self {
        Self {
            voltage,
            ..Self::new(capacitance)
        }
    }

    /// Companion resistance for a sub-step of length `dt`.
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        dt / self.capacitance
    }

    /// History current source, positive from start to end.
    pub fn history_current(&self, dt: f64) -> f64 {
        -self.capacitance * self.voltage / dt
    }

    /// Record the solved voltage and current after a sub-step.
    pub fn update_state(&mut self, voltage: f64, current: f64) {
        self.voltage = voltage;
        self.current = current;
    }

    /// Energy stored in the electric field, `C v^2 / 2`.
    pub fn stored_energy(&self) -> f64 {
        0.5 * self.capacitance * self.voltage * self.voltage
    }
}

/// An inductor component.
///
/// Discretized with backward Euler. From `v = L di/dt`:
///   i(n) = (dt/L) * v(n) + i(n-1)
///
/// which is a resistor `R_eq = L/dt` in parallel with a current source
/// carrying the previous sub-step's current.
#[derive(Debug, Clone, PartialEq)]
pub struct Inductor {
    /// Inductance in henries
    pub inductance: f64,

    // State carried between sub-steps
    /// Current through the inductor after the last sub-step
    pub current: f64,
    /// Voltage across the inductor during the last sub-step
    pub voltage: f64,
}

impl Inductor {
    /// Create a new inductor carrying no current.
    pub fn new(inductance: f64) -> Self {
        Self {
            inductance,
            current: 0.0,
            voltage: 0.0,
        }
    }

    /// Companion resistance for a sub-step of length `dt`.
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        self.inductance / dt
    }

    /// History current source, positive from start to end.
    pub fn history_current(&self) -> f64 {
        self.current
    }

    /// Record the solved voltage and current after a sub-step.
    pub fn update_state(&mut self, voltage: f64, current: f64) {
        self.voltage = voltage;
        self.current = current;
    }

    /// Energy stored in the magnetic field, `L i^2 / 2`.
    pub fn stored_energy(&self) -> f64 {
        0.5 * self.inductance * self.current * self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resistor_short_threshold() {
        assert!(!Resistor::new(1000.0).is_short());
        assert!(!Resistor::new(1e-6).is_short());
        assert!(Resistor::new(1e-12).is_short());
        assert!(Resistor::new(0.0).is_short());
    }

    #[test]
    fn test_capacitor_companion_model() {
        let mut c = Capacitor::new(1e-3);
        let dt = 1e-3;

        // R_eq = dt/C = 1 ohm
        assert_relative_eq!(c.companion_resistance(dt), 1.0);

        // Discharged capacitor has no history current
        assert_eq!(c.history_current(dt), 0.0);

        c.update_state(2.0, 0.5);
        assert_relative_eq!(c.voltage, 2.0);
        assert_relative_eq!(c.history_current(dt), -2.0);
    }

    #[test]
    fn test_capacitor_norton_pair_matches_backward_euler() {
        let c = Capacitor::with_voltage(0.5, 1.0);
        let dt = 0.01;
        let v_new = 1.2;

        let i_norton = v_new / c.companion_resistance(dt) + c.history_current(dt);
        let i_be = c.capacitance * (v_new - c.voltage) / dt;
        assert_relative_eq!(i_norton, i_be, epsilon = 1e-12);
    }

    #[test]
    fn test_inductor_companion_model() {
        let mut l = Inductor::new(2.0);
        let dt = 0.1;
        assert_relative_eq!(l.companion_resistance(dt), 20.0);

        l.update_state(4.0, 0.25);
        assert_relative_eq!(l.history_current(), 0.25);
        assert_relative_eq!(l.stored_energy(), 0.0625);
    }
}
