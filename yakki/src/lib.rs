pub mod batch;
pub mod cli;
pub mod config;

pub use batch::{parse_line, BatchLine};
pub use cli::{CliOptions, CliOutput, CliRunner};
pub use config::{AppConfig, ConfigError};
