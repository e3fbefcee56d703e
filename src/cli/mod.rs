pub mod commands;
pub mod dispatch;

pub use commands::Cli;
