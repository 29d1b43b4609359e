//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All terminal output goes through this module so quiet mode, debug
//! output and `--json` behave the same in every command. Diagnostics from
//! the library go through `tracing` instead and end up on stderr.

pub mod output;
