pub mod config;
pub mod report;

pub use config::{AnalysisConfig, Config};
pub use report::*;
