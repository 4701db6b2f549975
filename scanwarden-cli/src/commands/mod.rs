//! Command handlers -- one module per subcommand

pub mod command;
pub mod config;
pub mod parse;
pub mod report;
pub mod scan;
