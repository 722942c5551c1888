use harvester_core::HarvesterError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The job definition is structurally broken; nothing was executed.
    #[error(transparent)]
    Config(#[from] HarvesterError),

    /// The cron expression failed validation.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A caller broke an argument contract (e.g. batch size of zero).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
