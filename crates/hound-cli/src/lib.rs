//! Command-line surface for the recording bridge binary.

pub mod cli_args;

pub use cli_args::Cli;
