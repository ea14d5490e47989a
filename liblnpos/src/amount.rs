//! Amount entry for the till keypad
//!
//! Tracks the raw digit string a cashier types, enforcing the keypad rules:
//! no double leading zero, a single decimal point, at most two decimal
//! places, and a hard cap on input length. Conversion to sats happens
//! elsewhere; this is purely the text being edited.

/// Hard cap on the entered amount, in characters (decimal point included)
pub const MAX_INPUT_VALUE_LENGTH: usize = 14;

/// The amount being typed at the keypad
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmountEntry {
    value: String,
}

impl AmountEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume editing from a previously entered value
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The current input text, empty when nothing has been entered
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Append a keypad digit, returning whether it was accepted
    ///
    /// Rejected without change: a second leading zero, a second decimal
    /// point, a third decimal place, anything past the length cap, and keys
    /// that are not digits or the decimal point. A leading zero is replaced
    /// rather than extended, so "0" followed by "5" reads "5".
    pub fn add_digit(&mut self, digit: char) -> bool {
        if !digit.is_ascii_digit() && digit != '.' {
            return false;
        }

        let current = self.value.as_str();

        if (digit == '0' && current == "0")
            || (digit == '.' && current.contains('.'))
            || fraction_is_full(current)
            || current.len() >= MAX_INPUT_VALUE_LENGTH
        {
            return false;
        }

        if self.value == "0" || (digit == '.' && self.value.is_empty()) {
            self.value.clear();
        }

        self.value.push(digit);
        true
    }

    /// Remove the last digit; does nothing when the input is empty
    pub fn delete_digit(&mut self) {
        self.value.pop();
    }

    /// Wipe the input entirely
    pub fn clear(&mut self) {
        self.value.clear();
    }
}

/// Whether the value already carries two decimal places
fn fraction_is_full(value: &str) -> bool {
    match value.rfind('.') {
        Some(pos) => value.len() - pos - 1 >= 2,
        None => false,
    }
}
