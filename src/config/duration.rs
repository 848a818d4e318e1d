//! Duration strings in the `1h30m`, `10s`, `250ms` style
//!
//! A duration is one or more decimal numbers, each with an optional fraction
//! and a mandatory unit suffix. Valid units are `ns`, `us` (or `µs`), `ms`,
//! `s`, `m` and `h`. The bare string `0` is also accepted. Negative values
//! are rejected.

use std::time::Duration;

const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
];

/// Fraction digits beyond this are ignored
const MAX_FRACTION_DIGITS: usize = 18;

/// Error returned by [`parse_duration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationError(pub String);

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid duration {:?}", self.0)
    }
}

impl std::error::Error for DurationError {}

/// Parse a duration string
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let err = || DurationError(input.to_string());

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(err());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, tail) = rest.split_at(int_len);

        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => {
                let n = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                after_dot.split_at(n)
            }
            None => ("", tail),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(err)?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(err)?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
            let frac: u128 = digits.parse().map_err(|_| err())?;
            let frac_nanos = frac * scale / 10u128.pow(digits.len() as u32);
            nanos = nanos.checked_add(frac_nanos).ok_or_else(err)?;
        }

        total = total.checked_add(nanos).ok_or_else(err)?;
        rest = tail;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| err())
}
