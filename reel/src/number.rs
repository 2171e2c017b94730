//! Exact rational numbers and timebase arithmetic.
//!
//! Every number in the language is a [`BigRational`], so converting between
//! seconds and frame indices never accumulates rounding error.
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use thiserror::Error;

pub type Number = BigRational;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimebaseError {
    #[error("invalid timebase: '{0}'")]
    Invalid(String),
    #[error("timebase must be positive, got {0}")]
    NotPositive(Number),
}

pub fn int(i: i64) -> Number {
    Number::from_integer(BigInt::from(i))
}

pub fn ratio(numer: i64, denom: i64) -> Number {
    Number::new(BigInt::from(numer), BigInt::from(denom))
}

fn digits(s: &str) -> Option<BigInt> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses an integer (`42`), decimal (`29.97`) or fraction (`30000/1001`)
/// literal into an exact rational. Returns [`None`] for anything else,
/// including a zero denominator.
pub fn parse_number(lexeme: &str) -> Option<Number> {
    let (negative, body) = match lexeme.chars().next()? {
        '-' => (true, &lexeme[1..]),
        '+' => (false, &lexeme[1..]),
        _ => (false, lexeme),
    };
    let value = if let Some((numer, denom)) = body.split_once('/') {
        let denom = digits(denom)?;
        if denom.is_zero() {
            return None;
        }
        Number::new(digits(numer)?, denom)
    } else if let Some((whole, frac)) = body.split_once('.') {
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        let whole = if whole.is_empty() {
            BigInt::zero()
        } else {
            digits(whole)?
        };
        let scale = num_traits::pow(BigInt::from(10u32), frac.len());
        let frac = if frac.is_empty() {
            BigInt::zero()
        } else {
            digits(frac)?
        };
        Number::new(whole * &scale + frac, scale)
    } else {
        Number::from_integer(digits(body)?)
    };
    Some(if negative { -value } else { value })
}

/// True when the lexeme starts the way a numeric literal does,
/// e.g. `1`, `-2`, `.5` or `+.5`.
pub fn looks_numeric(lexeme: &str) -> bool {
    let rest = lexeme
        .strip_prefix(|c: char| c == '+' || c == '-')
        .unwrap_or(lexeme);
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

/// Parses a frame rate. Accepts any numeric literal plus the common names
/// `ntsc`, `ntsc_film`, `pal` and `film`.
pub fn parse_timebase(s: &str) -> Result<Number, TimebaseError> {
    let tb = match s.trim() {
        "ntsc" => ratio(30000, 1001),
        "ntsc_film" => ratio(24000, 1001),
        "pal" => int(25),
        "film" => int(24),
        other => parse_number(other).ok_or_else(|| TimebaseError::Invalid(s.to_owned()))?,
    };
    if !tb.is_positive() {
        return Err(TimebaseError::NotPositive(tb));
    }
    Ok(tb)
}

/// Nearest frame index for a time in seconds. Halves round away from zero.
pub fn seconds_to_frames(seconds: &Number, timebase: &Number) -> Number {
    (seconds * timebase).round()
}

/// Panics if `timebase` is zero; callers validate it first.
pub fn frames_to_seconds(frames: &Number, timebase: &Number) -> Number {
    frames / timebase
}

/// Converts a non-negative integral number into an index.
pub fn to_index(n: &Number) -> Option<usize> {
    if !n.is_integer() || n.is_negative() {
        return None;
    }
    n.to_integer().to_usize()
}
