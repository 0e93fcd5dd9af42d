//! Relay statistics

pub mod metrics;

pub use metrics::{HubSnapshot, HubStats, PipelineSnapshot, PipelineStats};
