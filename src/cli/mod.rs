//! CLI module for floorproof - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
