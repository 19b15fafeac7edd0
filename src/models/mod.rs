//! Serializable report models
//!
//! DTOs used to export cache statistics, e.g. as JSON from the demo binary.

pub mod report;

pub use report::StatsReport;
