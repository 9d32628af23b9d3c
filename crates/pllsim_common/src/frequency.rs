//! Frequency values and PLL divider arithmetic.
//!
//! The PLL output is `f_out = f_ref * M / (N * OD)`. [`Dividers`] holds one
//! `(N, M, OD)` triple, evaluates the formula with an explicit policy for
//! zero registers, and can search for the triple closest to a target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frequency value stored in Hertz.
///
/// Supports parsing from strings like "25MHz", "100KHz", "1GHz", "48000Hz",
/// and bare numeric values (interpreted as Hz). Displays using the most
/// appropriate unit for readability.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Frequency(f64);

impl Frequency {
    /// Creates a new frequency from a value in Hertz.
    pub fn new(hz: f64) -> Self {
        Self(hz)
    }

    /// Creates a new frequency from a value in megahertz.
    pub fn from_mhz(mhz: f64) -> Self {
        Self(mhz * 1_000_000.0)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Returns the frequency in kilohertz.
    pub fn khz(&self) -> f64 {
        self.0 / 1_000.0
    }

    /// Returns the frequency in megahertz.
    pub fn mhz(&self) -> f64 {
        self.0 / 1_000_000.0
    }

    /// Returns the frequency in gigahertz.
    pub fn ghz(&self) -> f64 {
        self.0 / 1_000_000_000.0
    }

    /// Returns the period of one cycle in nanoseconds.
    pub fn period_ns(&self) -> f64 {
        1_000_000_000.0 / self.0
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000_000.0 {
            write!(f, "{}GHz", hz / 1_000_000_000.0)
        } else if hz >= 1_000_000.0 {
            write!(f, "{}MHz", hz / 1_000_000.0)
        } else if hz >= 1_000.0 {
            write!(f, "{}KHz", hz / 1_000.0)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

/// Error type for parsing frequency strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (num, scale) = if let Some(num) = lower.strip_suffix("ghz") {
            (num, 1_000_000_000.0)
        } else if let Some(num) = lower.strip_suffix("mhz") {
            (num, 1_000_000.0)
        } else if let Some(num) = lower.strip_suffix("khz") {
            (num, 1_000.0)
        } else if let Some(num) = lower.strip_suffix("hz") {
            (num, 1.0)
        } else {
            (lower.as_str(), 1.0)
        };

        let val: f64 = num.trim().parse().map_err(|_| err())?;
        let hz = val * scale;
        if !hz.is_finite() || hz < 0.0 {
            return Err(err());
        }
        Ok(Frequency(hz))
    }
}

/// Errors produced by the divider arithmetic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DividerError {
    /// A divider register (`N` or `OD`) is zero.
    #[error("divider register {register} is zero")]
    ZeroDivider {
        /// Name of the offending register.
        register: &'static str,
    },

    /// The multiplier register `M` is zero, which would give a 0 Hz output.
    #[error("multiplier register M is zero")]
    ZeroMultiplier,

    /// The formula overflowed or the reference itself is not finite.
    #[error("output frequency from {reference} with {dividers} is not finite")]
    NonFinite {
        /// The reference frequency.
        reference: Frequency,
        /// The divider triple.
        dividers: Dividers,
    },

    /// No divider triple within the limits produces the target.
    #[error("no divider setting reaches {target} from {reference}")]
    Unreachable {
        /// The requested output frequency.
        target: Frequency,
        /// The reference frequency.
        reference: Frequency,
    },
}

/// Inclusive upper bounds for the divider search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerLimits {
    /// Largest allowed `N`.
    pub max_n: u32,
    /// Largest allowed `M`.
    pub max_m: u32,
    /// Largest allowed `OD`.
    pub max_od: u32,
}

impl Default for DividerLimits {
    /// 8-bit divider fields.
    fn default() -> Self {
        Self {
            max_n: 255,
            max_m: 255,
            max_od: 255,
        }
    }
}

/// One `(N, M, OD)` register triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dividers {
    /// Input (reference) divider.
    pub n: u32,
    /// Feedback multiplier.
    pub m: u32,
    /// Output divider.
    pub od: u32,
}

impl Dividers {
    /// Creates a divider triple.
    pub fn new(n: u32, m: u32, od: u32) -> Self {
        Self { n, m, od }
    }

    /// Computes `reference * M / (N * OD)`.
    ///
    /// Zero registers and non-finite results are reported as errors
    /// instead of producing an infinite or zero frequency.
    pub fn output_frequency(&self, reference: Frequency) -> Result<Frequency, DividerError> {
        if self.n == 0 {
            return Err(DividerError::ZeroDivider { register: "N" });
        }
        if self.od == 0 {
            return Err(DividerError::ZeroDivider { register: "OD" });
        }
        if self.m == 0 {
            return Err(DividerError::ZeroMultiplier);
        }
        let hz = reference.hz() * f64::from(self.m) / (f64::from(self.n) * f64::from(self.od));
        if !hz.is_finite() {
            return Err(DividerError::NonFinite {
                reference,
                dividers: *self,
            });
        }
        Ok(Frequency::new(hz))
    }

    /// Finds the triple whose output is closest to `target`.
    ///
    /// The search walks `N` then `OD` in ascending order and keeps the first
    /// best match, so exact results prefer the smallest dividers.
    pub fn solve(
        reference: Frequency,
        target: Frequency,
        limits: DividerLimits,
    ) -> Result<Self, DividerError> {
        let unreachable = || DividerError::Unreachable { target, reference };
        if reference.hz() <= 0.0 || target.hz() <= 0.0 {
            return Err(unreachable());
        }

        let mut best: Option<(f64, Dividers)> = None;
        for n in 1..=limits.max_n {
            for od in 1..=limits.max_od {
                let ideal = target.hz() * f64::from(n) * f64::from(od) / reference.hz();
                let m = ideal.round();
                if m < 1.0 || m > f64::from(limits.max_m) {
                    continue;
                }
                let candidate = Dividers::new(n, m as u32, od);
                let Ok(actual) = candidate.output_frequency(reference) else {
                    continue;
                };
                let error = (actual.hz() - target.hz()).abs();
                if error == 0.0 {
                    return Ok(candidate);
                }
                if best.is_none_or(|(e, _)| error < e) {
                    best = Some((error, candidate));
                }
            }
        }

        best.map(|(_, d)| d).ok_or_else(unreachable)
    }
}

impl fmt::Display for Dividers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={}, M={}, OD={}", self.n, self.m, self.od)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ref_25mhz() -> Frequency {
        Frequency::from_mhz(25.0)
    }

    #[test]
    fn parse_ghz() {
        let f: Frequency = "1GHz".parse().unwrap();
        assert_eq!(f.hz(), 1_000_000_000.0);
    }

    #[test]
    fn parse_mhz() {
        let f: Frequency = "25MHz".parse().unwrap();
        assert_eq!(f.hz(), 25_000_000.0);
    }

    #[test]
    fn parse_bare_number() {
        let f: Frequency = "48000".parse().unwrap();
        assert_eq!(f.hz(), 48_000.0);
    }

    #[test]
    fn parse_case_insensitive() {
        let f: Frequency = "800mhz".parse().unwrap();
        assert_eq!(f.mhz(), 800.0);
    }

    #[test]
    fn parse_negative_rejected() {
        assert!("-5MHz".parse::<Frequency>().is_err());
    }

    #[test]
    fn parse_overflowing_scale_rejected() {
        assert!("1e300GHz".parse::<Frequency>().is_err());
        assert!("inf".parse::<Frequency>().is_err());
    }

    #[test]
    fn parse_invalid() {
        let err = "fast".parse::<Frequency>().unwrap_err();
        assert_eq!(err.to_string(), "invalid frequency: 'fast'");
    }

    #[test]
    fn display_selects_best_unit() {
        assert_eq!(Frequency::from_mhz(800.0).to_string(), "800MHz");
        assert_eq!(Frequency::new(1_600_000_000.0).to_string(), "1.6GHz");
        assert_eq!(Frequency::new(500.0).to_string(), "500Hz");
    }

    #[test]
    fn period_of_800mhz() {
        assert_eq!(Frequency::from_mhz(800.0).period_ns(), 1.25);
    }

    #[test]
    fn output_frequency_formula() {
        let f = Dividers::new(1, 32, 1).output_frequency(ref_25mhz()).unwrap();
        assert_eq!(f.mhz(), 800.0);
        let f = Dividers::new(5, 40, 2).output_frequency(ref_25mhz()).unwrap();
        assert_eq!(f.mhz(), 100.0);
    }

    #[test]
    fn zero_n_is_error() {
        let err = Dividers::new(0, 32, 1)
            .output_frequency(ref_25mhz())
            .unwrap_err();
        assert_eq!(err, DividerError::ZeroDivider { register: "N" });
    }

    #[test]
    fn zero_od_is_error() {
        let err = Dividers::new(1, 32, 0)
            .output_frequency(ref_25mhz())
            .unwrap_err();
        assert_eq!(err, DividerError::ZeroDivider { register: "OD" });
    }

    #[test]
    fn zero_m_is_error() {
        let err = Dividers::new(1, 0, 1)
            .output_frequency(ref_25mhz())
            .unwrap_err();
        assert_eq!(err, DividerError::ZeroMultiplier);
    }

    #[test]
    fn non_finite_output_is_error() {
        let reference = Frequency::new(f64::MAX);
        let err = Dividers::new(1, 255, 1)
            .output_frequency(reference)
            .unwrap_err();
        assert!(matches!(err, DividerError::NonFinite { .. }));
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn solve_exact_800mhz() {
        let d = Dividers::solve(
            ref_25mhz(),
            Frequency::from_mhz(800.0),
            DividerLimits::default(),
        )
        .unwrap();
        assert_eq!(d, Dividers::new(1, 32, 1));
    }

    #[test]
    fn solve_approximate_target() {
        let target = Frequency::new(33_333_333.0);
        let d = Dividers::solve(ref_25mhz(), target, DividerLimits::default()).unwrap();
        let actual = d.output_frequency(ref_25mhz()).unwrap();
        assert!((actual.hz() - target.hz()).abs() < 100_000.0);
    }

    #[test]
    fn solve_out_of_range() {
        let limits = DividerLimits {
            max_n: 1,
            max_m: 4,
            max_od: 1,
        };
        let err = Dividers::solve(ref_25mhz(), Frequency::from_mhz(800.0), limits).unwrap_err();
        assert!(matches!(err, DividerError::Unreachable { .. }));
    }

    #[test]
    fn solve_zero_target() {
        let err = Dividers::solve(ref_25mhz(), Frequency::new(0.0), DividerLimits::default())
            .unwrap_err();
        assert!(matches!(err, DividerError::Unreachable { .. }));
    }

    #[test]
    fn dividers_display() {
        assert_eq!(Dividers::new(1, 32, 1).to_string(), "N=1, M=32, OD=1");
    }

    #[test]
    fn dividers_serde_roundtrip() {
        let d = Dividers::new(2, 64, 4);
        let json = serde_json::to_string(&d).unwrap();
        let back: Dividers = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
