//! Time-unit constants and parsing of human-readable durations.
//!
//! All simulated time in the workspace is counted in femtoseconds. Durations
//! in configuration files and on the command line are written with a unit
//! suffix (`"10ns"`, `"20us"`) and converted with [`parse_duration`].

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDurationError {
    /// The input was empty or whitespace.
    #[error("empty duration string")]
    Empty,

    /// The input did not start with a number.
    #[error("invalid duration: no numeric value in '{0}'")]
    NoNumber(String),

    /// The numeric part did not fit in a `u64` or overflowed on scaling.
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),

    /// The number had no unit suffix.
    #[error("missing unit in duration '{0}' (use fs, ps, ns, us, ms, or s)")]
    MissingUnit(String),

    /// The unit suffix was not recognized.
    #[error("unknown duration unit '{0}' (use fs, ps, ns, us, ms, or s)")]
    UnknownUnit(String),
}

/// Parses a duration such as `"500ns"` or `"20 us"` into femtoseconds.
pub fn parse_duration(s: &str) -> Result<u64, ParseDurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseDurationError::Empty);
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(ParseDurationError::NoNumber(s.to_string()));
    }

    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| ParseDurationError::OutOfRange(s.to_string()))?;

    let multiplier = match s[digit_end..].trim() {
        "fs" => 1,
        "ps" => FS_PER_PS,
        "ns" => FS_PER_NS,
        "us" => FS_PER_US,
        "ms" => FS_PER_MS,
        "s" => FS_PER_S,
        "" => return Err(ParseDurationError::MissingUnit(s.to_string())),
        unit => return Err(ParseDurationError::UnknownUnit(unit.to_string())),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| ParseDurationError::OutOfRange(s.to_string()))
}
