//! Mapping module - turns controller reports into virtual pad state

pub mod config;
pub mod translator;

pub use config::{Config, ConfigError};
pub use translator::ReportTranslator;
