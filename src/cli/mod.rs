//! CLI subcommand implementations for the pagesnap binary.

pub mod capture_cmd;
pub mod doctor;
pub mod output;
