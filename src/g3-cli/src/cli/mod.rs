//! CLI argument definitions for g3
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod new;

pub use self::core::{Cli, Commands};
pub use self::new::{BoxArg, NewKind};
