//! Canonical textual rendering of instruction parameters.

use std::fmt;

/// A typed instruction parameter before it is rendered to its wire text
/// form. Every instruction writer in [`super::instructions`] builds its
/// element list out of these instead of formatting numbers/bools ad hoc,
/// so the canonical rendering rules live in exactly one place.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    /// Renders the canonical decimal / `0`/`1` text form used on the wire.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Int(n as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Parses a raw wire element as a base-10 integer.
pub fn parse_int(raw: &str) -> Result<i64, std::num::ParseIntError> {
    raw.parse::<i64>()
}

/// Parses a raw wire element as a boolean: `"0"` is false, any other
/// (including empty) string is true.
pub fn parse_bool(raw: &str) -> bool {
    raw != "0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_text_unchanged() {
        assert_eq!(Value::from("hello").render(), "hello");
    }

    #[test]
    fn renders_ints_decimal() {
        assert_eq!(Value::from(100i32).render(), "100");
        assert_eq!(Value::from(-5i64).render(), "-5");
    }

    #[test]
    fn renders_bools_as_bit() {
        assert_eq!(Value::from(true).render(), "1");
        assert_eq!(Value::from(false).render(), "0");
    }

    #[test]
    fn parse_bool_matches_spec_rule() {
        assert!(!parse_bool("0"));
        assert!(parse_bool("1"));
        assert!(parse_bool("anything"));
        assert!(parse_bool(""));
    }
}
