use harvester_core::JobDefinition;
use serde::{Deserialize, Serialize};

use crate::pipeline::JobRunReport;

/// Final state of a run as recorded in the audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Every combination was attempted and at least one call succeeded
    /// (or there was nothing to call).
    Completed,
    /// Cancelled part-way; counts are partial.
    Stopped,
    /// Calls were made and none of them succeeded.
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Stopped => "STOPPED",
            ExecutionStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(ExecutionStatus::Completed),
            "STOPPED" => Ok(ExecutionStatus::Stopped),
            "FAILED" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One audit row per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// The run id (UUID v7), primary key.
    pub id: String,
    pub job_code: String,
    /// `YYYY-MM-DD` date the run was made for.
    pub base_date: String,
    pub status: ExecutionStatus,
    /// RFC 3339.
    pub start_time: String,
    /// RFC 3339.
    pub end_time: String,
    pub processed_count: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub error_message: Option<String>,
    /// JSON text of the job's base parameters.
    pub parameters: String,
}

impl ExecutionLog {
    pub fn from_report(job: &JobDefinition, report: &JobRunReport) -> Self {
        let run = &report.run;
        let status = if run.cancelled {
            ExecutionStatus::Stopped
        } else if run.processed() > 0 && run.success_count == 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        let mut problems: Vec<String> =
            report.warnings.iter().map(ToString::to_string).collect();
        if let Some(first) = run.first_error() {
            problems.push(format!("first call error: {first}"));
        }
        let error_message = (!problems.is_empty()).then(|| problems.join("; "));

        // BaseParameters is a plain JSON object; serialising it cannot fail.
        let parameters =
            serde_json::to_string(&job.base_parameters).unwrap_or_else(|_| "{}".to_string());

        Self {
            id: report.run_id.to_string(),
            job_code: report.job_code.clone(),
            base_date: report.base_date.format("%Y-%m-%d").to_string(),
            status,
            start_time: report.started_at.to_rfc3339(),
            end_time: report.finished_at.to_rfc3339(),
            processed_count: run.processed() as u64,
            success_count: run.success_count as u64,
            fail_count: run.fail_count as u64,
            error_message,
            parameters,
        }
    }
}

/// Per-job totals over the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatistics {
    pub job_code: String,
    pub run_count: u64,
    pub completed_count: u64,
    pub stopped_count: u64,
    pub failed_count: u64,
    /// Calls made across all counted runs.
    pub processed_total: u64,
    pub success_total: u64,
    pub fail_total: u64,
    /// RFC 3339 end time of the latest run.
    pub last_end_time: Option<String>,
}
