use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing trace or span ids out of their hex string form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    /// The input was empty or longer than the id permits.
    #[error("id length must be between 1 and {max} hex characters, got {len}")]
    InvalidLength {
        /// Maximum number of hex characters for this id type.
        max: usize,
        /// Length of the rejected input.
        len: usize,
    },
    /// The input contained a character outside `0-9a-fA-F`.
    #[error("id contains a non-hex character")]
    NonHexDigit,
}

/// A 128-bit trace identifier stored as two 64-bit halves.
///
/// `high == 0` marks a 64-bit id. The canonical string form is 16 or 32
/// lowercase hex characters with no separator and no prefix; leading
/// zeros are not stripped. Parsing accepts 1 to 32 hex characters,
/// case-insensitive, without requiring zero padding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId {
    /// Most significant 64 bits; zero for 64-bit ids.
    pub high: u64,
    /// Least significant 64 bits; always present.
    pub low: u64,
}

impl TraceId {
    /// Create a trace id from its two halves.
    pub const fn new(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    /// Whether both halves are zero, i.e. the id is invalid.
    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl FromStr for TraceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 32 {
            return Err(ParseIdError::InvalidLength {
                max: 32,
                len: s.len(),
            });
        }
        if s.len() > 16 {
            let split = s.len() - 16;
            Ok(TraceId {
                high: parse_hex_u64(&s[..split])?,
                low: parse_hex_u64(&s[split..])?,
            })
        } else {
            Ok(TraceId {
                high: 0,
                low: parse_hex_u64(s)?,
            })
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{:016x}", self.low)
        } else {
            write!(f, "{:016x}{:016x}", self.high, self.low)
        }
    }
}

/// A 64-bit span identifier.
///
/// Canonical string form is 16 lowercase hex characters; parsing accepts
/// 1 to 16, case-insensitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub u64);

impl SpanId {
    /// The all-zero id, used as the absent-parent sentinel.
    pub const ZERO: SpanId = SpanId(0);

    /// Whether the id is zero, i.e. absent or invalid.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl FromStr for SpanId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 {
            return Err(ParseIdError::InvalidLength {
                max: 16,
                len: s.len(),
            });
        }
        Ok(SpanId(parse_hex_u64(s)?))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// Folds up to 16 hex digits into a u64. Callers bound the input length.
fn parse_hex_u64(s: &str) -> Result<u64, ParseIdError> {
    let mut value: u64 = 0;
    for c in s.chars() {
        let digit = c.to_digit(16).ok_or(ParseIdError::NonHexDigit)?;
        value = (value << 4) | u64::from(digit);
    }
    Ok(value)
}
