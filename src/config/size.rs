//! Human readable capacity parsing
//!
//! Accepts a positive integer immediately followed by a two letter unit tag,
//! `mb` or `gb` in any case: `64MB`, `1gb`. Multiples are binary.

/// One kibibyte
pub const KIB: u64 = 1 << 10;
/// One mebibyte
pub const MIB: u64 = KIB << 10;
/// One gibibyte
pub const GIB: u64 = MIB << 10;

/// Error returned by [`parse_size`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// The numeric prefix is not an integer
    Format(String),
    /// The numeric prefix is zero, negative or too large
    Range(i64),
    /// The unit tag is not recognized
    Syntax(String),
}

impl std::fmt::Display for SizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeError::Format(value) => write!(f, "incorrect format for value: {:?}", value),
            SizeError::Range(n) => write!(f, "value must be positive and in range, got {}", n),
            SizeError::Syntax(value) => write!(f, "syntax error for value: {:?}", value),
        }
    }
}

impl std::error::Error for SizeError {}

/// Convert a capacity string such as `64MB` into a byte count
pub fn parse_size(value: &str) -> Result<u64, SizeError> {
    if value.len() < 2 || !value.is_char_boundary(value.len() - 2) {
        return Err(SizeError::Syntax(value.to_string()));
    }
    let (number, unit) = value.split_at(value.len() - 2);

    let n: i64 = number
        .parse()
        .map_err(|_| SizeError::Format(value.to_string()))?;
    if n <= 0 {
        return Err(SizeError::Range(n));
    }

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "mb" => MIB,
        "gb" => GIB,
        _ => return Err(SizeError::Syntax(value.to_string())),
    };

    (n as u64).checked_mul(multiplier).ok_or(SizeError::Range(n))
}
