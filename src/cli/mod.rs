//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, CommonArgs};
pub use commands::{
    build_session, clip_script, list_formats, print_phrases, resolve_profile, run_script, snap_script,
};
pub use crate::event_loop::Script;
pub use enums::{Effect, Profile, Style};
