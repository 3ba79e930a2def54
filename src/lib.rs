//! Survey correlation explorer: load tabular survey data, correlate a chosen
//! subset of variables and ask a completion service to interpret the
//! strongest relationships.
//!
//! The GUI lives in the `survey-lens` binary; everything here is toolkit
//! independent so the label export script and the tests can use it directly.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod narrative;

pub use error::{AnalysisError, ConfigError, LoadError, NarrativeError, PipelineError, SelectionError};
