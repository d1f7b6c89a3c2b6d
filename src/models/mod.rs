//! Data models for configuration and diagnostic reports

pub mod config;
pub mod report;

pub use config::Config;
pub use report::{AdvancedResults, EndpointResult, Finding, TestSummary, Verdict};
