//! Parsing, validation, and resolution of `pllsim.toml` run configurations.
//!
//! Every table is optional. An empty file describes the reference run: a
//! 10 ns clock, a 25 MHz reference, a host that programs the device for
//! 800 MHz and waits up to 20 us for lock.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve, ResolvedConfig, Step, WaveformSettings};
pub use types::*;
