//! Subcommand implementations.

pub mod inspect;
pub mod stubs;
pub mod verify;
