//! Command-line interface for playstream.
//!
//! `play` is the default command; the others inspect or maintain the
//! local library scan, saved sessions, the metadata cache and the config.

mod commands;

pub use commands::{Cli, Commands, run_command};
