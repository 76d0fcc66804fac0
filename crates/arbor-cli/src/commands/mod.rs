//! Subcommand implementations.

pub mod common;
pub mod export;
pub mod nodes;
pub mod process;
pub mod tree;
pub mod validate;
