//! Shared building blocks for the harvester workspace: configuration,
//! the top-level error type, and the job / parameter-source data model.

pub mod config;
pub mod error;
pub mod types;

pub use error::{HarvesterError, Result};
pub use types::{
    BaseParameters, ExpansionMode, HttpMethod, JobDefinition, ParameterCombination,
    ParameterSource, SourceKind,
};
