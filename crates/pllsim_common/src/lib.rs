//! Shared foundational types used across the pllsim workspace.
//!
//! This crate provides time-unit constants and duration parsing, frequency
//! values, and the PLL divider arithmetic (output frequency formula and the
//! divider solver used by the host model).

#![warn(missing_docs)]

pub mod duration;
pub mod frequency;

pub use duration::{parse_duration, ParseDurationError};
pub use duration::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S, FS_PER_US};
pub use frequency::{DividerError, DividerLimits, Dividers, Frequency, ParseFrequencyError};
