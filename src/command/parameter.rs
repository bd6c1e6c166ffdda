// Command parameters and the fixed row layout

/// Column holding the command id
pub const CMD_COL: usize = 0;
/// MIDI channel, or target sequence for modifier commands
pub const CHANNEL_COL: usize = 1;
/// Note number, or modifier amount
pub const NOTE_COL: usize = 2;
pub const VELOCITY_COL: usize = 3;
/// Note length in ticks
pub const DURATION_COL: usize = 4;
/// Fire probability, 0..1
pub const PROBABILITY_COL: usize = 5;

/// Width of every row: the command column plus one column per parameter
pub const ROW_WIDTH: usize = 6;

/// Number of parameters every command declares
pub const PARAMETER_COUNT: usize = ROW_WIDTH - 1;

/// One editable numeric field of a command
///
/// Immutable once its command is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub short_name: String,
    pub min: f64,
    pub max: f64,
    /// Increment used by editor increment/decrement
    pub step: f64,
    pub default_value: f64,
    /// Row column this parameter is stored in (never `CMD_COL`)
    pub column_index: usize,
    pub decimal_places: usize,
}

impl Parameter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        short_name: &str,
        min: f64,
        max: f64,
        step: f64,
        default_value: f64,
        column_index: usize,
        decimal_places: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
            min,
            max,
            step,
            default_value,
            column_index,
            decimal_places,
        }
    }

    /// Integer parameter with a step of 1
    pub fn integer(
        name: &str,
        short_name: &str,
        min: f64,
        max: f64,
        default_value: f64,
        column_index: usize,
    ) -> Self {
        Self::new(name, short_name, min, max, 1.0, default_value, column_index, 0)
    }

    /// Placeholder for a column the command does not read
    pub fn unused(column_index: usize) -> Self {
        Self::new("Unused", "--", 0.0, 0.0, 0.0, 0.0, column_index, 0)
    }

    /// Clamp `value` into `[min, max]`; NaN collapses to the default
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default_value;
        }
        value.clamp(self.min, self.max)
    }

    /// `value` moved up one step, clamped
    pub fn increment(&self, value: f64) -> f64 {
        self.clamp(value + self.step)
    }

    /// `value` moved down one step, clamped
    pub fn decrement(&self, value: f64) -> f64 {
        self.clamp(value - self.step)
    }

    /// Format `value` with this parameter's precision
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimal_places, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_boundaries() {
        let param = Parameter::integer("Velocity", "Vel", 0.0, 127.0, 64.0, VELOCITY_COL);
        assert_eq!(param.clamp(-1.0), 0.0);
        assert_eq!(param.clamp(127.0), 127.0);
        assert_eq!(param.clamp(200.0), 127.0);
        assert_eq!(param.clamp(f64::NAN), 64.0);
    }

    #[test]
    fn test_increment_decrement_respect_step() {
        let param = Parameter::new("Probability", "Prob", 0.0, 1.0, 0.1, 1.0, PROBABILITY_COL, 1);
        assert!((param.decrement(1.0) - 0.9).abs() < 1e-9);
        assert_eq!(param.increment(1.0), 1.0);
        assert_eq!(param.decrement(0.05), 0.0);
        assert_eq!(param.format(0.5), "0.5");
    }
}
