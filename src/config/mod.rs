//! Configuration and CLI handling

pub mod cli;
pub mod settings;

pub use cli::{Cli, Command, CompareArgs, FetchArgs};
pub use settings::{FetchSettings, SeparatorSettings, Settings};
