//! Simulation time with femtosecond resolution and delta cycles.
//!
//! [`SimTime`] orders events first by the instant (femtoseconds) and then by
//! the delta index inside that instant. Deltas separate the evaluate/update
//! rounds of one instant; they never move the clock forward.

use pllsim_common::duration::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_US};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point in simulated time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// The instant in femtoseconds.
    pub fs: u64,
    /// Delta cycle index within the instant.
    pub delta: u32,
}

impl SimTime {
    /// Time zero, delta zero.
    pub fn zero() -> Self {
        Self { fs: 0, delta: 0 }
    }

    /// The first delta of the given instant.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// The first delta of the given instant in nanoseconds.
    pub fn from_ns(ns: u64) -> Self {
        Self::from_fs(ns * FS_PER_NS)
    }

    /// Returns the next delta cycle of the same instant.
    pub fn next_delta(&self) -> Self {
        Self {
            fs: self.fs,
            delta: self.delta + 1,
        }
    }

    /// Moves to a later instant, resetting the delta counter.
    pub fn advance_to(&self, new_fs: u64) -> Self {
        debug_assert!(
            new_fs >= self.fs,
            "cannot advance backwards: {} -> {}",
            self.fs,
            new_fs
        );
        Self::from_fs(new_fs)
    }

    /// The instant `duration_fs` after this one, saturating at the end of time.
    pub fn after(&self, duration_fs: u64) -> u64 {
        self.fs.saturating_add(duration_fs)
    }

    /// The instant without its delta index.
    pub fn instant(&self) -> Self {
        Self::from_fs(self.fs)
    }

    /// Converts to nanoseconds (truncated).
    pub fn to_ns(&self) -> u64 {
        self.fs / FS_PER_NS
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Unit table used by `Display`, largest first.
const UNITS: [(u64, &str); 4] = [
    (FS_PER_MS, "ms"),
    (FS_PER_US, "us"),
    (FS_PER_NS, "ns"),
    (FS_PER_PS, "ps"),
];

impl fmt::Display for SimTime {
    /// Prints the instant in the largest unit that divides it exactly,
    /// followed by `+dN` when the delta index is non-zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        match UNITS
            .iter()
            .find(|(scale, _)| fs >= *scale && fs.is_multiple_of(*scale))
        {
            Some((scale, unit)) => write!(f, "{} {unit}", fs / scale)?,
            None if fs == 0 => write!(f, "0 ns")?,
            None => write!(f, "{fs} fs")?,
        }
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}
