//! Offline subcommands that read the database directly.

pub mod doctor;
pub mod stats;
