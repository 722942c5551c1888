//! `harvester-scheduler` — batched execution of expanded jobs.
//!
//! # Overview
//!
//! A run goes through four stages, each handing its output to the next by
//! value:
//!
//! | Stage   | Module       | Output                                |
//! |---------|--------------|---------------------------------------|
//! | accept  | [`cron`]     | job passes structural + cron checks   |
//! | expand  | `harvester-params` | ordered parameter combinations  |
//! | group   | [`batch`]    | fixed-size [`ExecutionBatch`]es       |
//! | run     | [`runner`]   | [`RunReport`] with per-call outcomes  |
//!
//! [`pipeline::JobPipeline`] chains the stages; [`db`] keeps an audit row
//! per run.

pub mod batch;
pub mod cron;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod types;

pub use batch::{group, ExecutionBatch};
pub use cron::{CronError, CronValidator};
pub use db::ExecutionLogStore;
pub use error::{Result, SchedulerError};
pub use pipeline::{ExecutionPlan, JobPipeline, JobRunReport};
pub use runner::{
    ApiCaller, CallError, CallTarget, ExecutionOutcome, ExecutionRunner, RunReport, RunState,
};
pub use types::{ExecutionLog, ExecutionStatus, JobStatistics};
