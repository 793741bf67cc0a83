// server/src/cli/mod.rs

// Argument parsing and the handlers behind each `dispatch` subcommand.

pub mod cli;
pub mod handlers;
