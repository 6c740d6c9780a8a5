pub mod runner;

pub use runner::{CliOptions, CliOutput, CliRunner};
