//! Ideal voltage and current sources.

/// An ideal battery.
///
/// The end terminal is positive: the battery enforces `V(end) - V(start) = voltage`.
/// Its current cannot be derived from Ohm's law, so every battery adds a
/// current unknown to the MNA system.
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// Terminal voltage in volts
    pub voltage: f64,
}

impl Battery {
    /// Create a new battery.
    pub fn new(voltage: f64) -> Self {
        Self { voltage }
    }
}

/// An ideal current source.
///
/// Current flows from start to end through the source. Current sources only
/// touch the right-hand side of the KCL equations.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSource {
    /// Source current in amperes
    pub current: f64,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(current: f64) -> Self {
        Self { current }
    }
}
