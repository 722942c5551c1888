//! `job → combinations → batches → outcomes → report`.
//!
//! Each stage takes the previous stage's output by value or reference and
//! returns a fresh value; nothing is shared between runs.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use harvester_core::JobDefinition;
use harvester_params::{ExpansionWarning, ParameterSpaceExpander};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{group, ExecutionBatch};
use crate::cron::CronValidator;
use crate::error::{Result, SchedulerError};
use crate::runner::{ApiCaller, CallTarget, ExecutionRunner, RunReport};

/// Expanded and grouped work for one job, before any call is made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub total_combinations: usize,
    pub batches: Vec<ExecutionBatch>,
    pub warnings: Vec<ExpansionWarning>,
}

/// Everything known about a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRunReport {
    pub run_id: Uuid,
    pub job_code: String,
    pub base_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_combinations: usize,
    pub batch_count: usize,
    pub warnings: Vec<ExpansionWarning>,
    pub run: RunReport,
}

pub struct JobPipeline {
    expander: ParameterSpaceExpander,
    caller: Arc<dyn ApiCaller>,
    cron: CronValidator,
    cancel: CancellationToken,
    base_date: Option<NaiveDate>,
}

impl JobPipeline {
    pub fn new(expander: ParameterSpaceExpander, caller: Arc<dyn ApiCaller>) -> Self {
        Self {
            expander,
            caller,
            cron: CronValidator::new(),
            cancel: CancellationToken::new(),
            base_date: None,
        }
    }

    /// Cancelling `cancel` stops the run between calls.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Date recorded on reports. Defaults to the local date at run start.
    pub fn with_base_date(mut self, date: NaiveDate) -> Self {
        self.base_date = Some(date);
        self
    }

    /// Gate for scheduling: structural checks, then the cron expression.
    pub fn accept(&self, job: &JobDefinition) -> Result<()> {
        if let Err(e) = job.validate() {
            warn!(job_code = %job.job_code, code = e.code(), error = %e, "job rejected");
            return Err(e.into());
        }
        self.cron
            .check(&job.cron_expression)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        info!(job_code = %job.job_code, cron = %job.cron_expression, "job accepted");
        Ok(())
    }

    /// Expand and group without calling anything.
    pub async fn plan(&self, job: &JobDefinition) -> Result<ExecutionPlan> {
        job.validate()?;
        let expansion = self.expander.expand_job(job).await;
        let total_combinations = expansion.len();
        if expansion.is_empty() {
            warn!(job_code = %job.job_code, "no parameter combinations, nothing to call");
        }
        let batches = group(expansion.combinations, job.batch_size as usize)?;
        Ok(ExecutionPlan {
            total_combinations,
            batches,
            warnings: expansion.warnings,
        })
    }

    /// Run the job once. A structurally invalid job fails before any call;
    /// call failures and source warnings never fail the run.
    pub async fn execute(&self, job: &JobDefinition) -> Result<JobRunReport> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let base_date = self
            .base_date
            .unwrap_or_else(|| Local::now().date_naive());
        info!(%run_id, job_code = %job.job_code, %base_date, "job run started");

        let plan = self.plan(job).await?;
        let runner = ExecutionRunner::new(job.delay()).with_cancellation(self.cancel.clone());
        let run = runner
            .run(&plan.batches, self.caller.as_ref(), &CallTarget::for_job(job))
            .await;

        let report = JobRunReport {
            run_id,
            job_code: job.job_code.clone(),
            base_date,
            started_at,
            finished_at: Utc::now(),
            total_combinations: plan.total_combinations,
            batch_count: plan.batches.len(),
            warnings: plan.warnings,
            run,
        };
        info!(
            %run_id,
            job_code = %report.job_code,
            combinations = report.total_combinations,
            success = report.run.success_count,
            failed = report.run.fail_count,
            cancelled = report.run.cancelled,
            "job run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CallError, RunState};
    use async_trait::async_trait;
    use harvester_core::{HttpMethod, ParameterCombination};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCaller {
        calls: Mutex<Vec<ParameterCombination>>,
        fail_when: Option<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl ApiCaller for RecordingCaller {
        async fn invoke(
            &self,
            url: &str,
            method: HttpMethod,
            params: &ParameterCombination,
        ) -> std::result::Result<String, CallError> {
            assert_eq!(url, "http://localhost/trades");
            assert_eq!(method, HttpMethod::Get);
            self.calls.lock().unwrap().push(params.clone());
            match self.fail_when {
                Some((k, v)) if params.get_str(k) == Some(v) => {
                    Err(CallError::Request("connection reset".to_string()))
                }
                _ => Ok("{}".to_string()),
            }
        }
    }

    fn job(extra: serde_json::Value) -> JobDefinition {
        let mut doc = serde_json::json!({
            "job_code": "APT_TRADE",
            "job_name": "Apartment trades",
            "resource_url": "http://localhost/trades",
            "cron_expression": "0 0 2 * * ?",
            "base_parameters": {"serviceKey": "k"},
            "batch_size": 4,
        });
        if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                doc.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(doc).unwrap()
    }

    fn pipeline(caller: Arc<RecordingCaller>) -> JobPipeline {
        JobPipeline::new(ParameterSpaceExpander::default(), caller)
            .with_base_date(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap())
    }

    fn matrix_job() -> JobDefinition {
        job(serde_json::json!({
            "parameter_expansion_mode": "MATRIX",
            "parameter_sources": [
                {"parameter_name": "REGION", "source_kind": "STATIC_LIST",
                 "source_spec": ["11110", "26110"], "sort_order": 1},
                {"parameter_name": "MONTH", "source_kind": "DATE_RANGE",
                 "source_spec": {"startDate": "2024-01-01", "endDate": "2024-03-01"},
                 "sort_order": 2},
            ],
        }))
    }

    #[tokio::test]
    async fn accept_checks_structure_then_cron() {
        let p = pipeline(Arc::default());
        assert!(p.accept(&job(serde_json::json!({}))).is_ok());

        let err = p
            .accept(&job(serde_json::json!({"cron_expression": "0 0 2 * * *"})))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));

        // Structure is checked first even when the cron is also bad.
        let err = p
            .accept(&job(serde_json::json!({"job_code": "bad code", "cron_expression": "x"})))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[tokio::test]
    async fn matrix_job_runs_every_combination() {
        let caller = Arc::new(RecordingCaller::default());
        let report = pipeline(caller.clone()).execute(&matrix_job()).await.unwrap();

        assert_eq!(report.total_combinations, 6);
        assert_eq!(report.batch_count, 2);
        assert_eq!(report.run.success_count, 6);
        assert_eq!(report.run.state, RunState::Completed);
        assert!(report.warnings.is_empty());
        assert_eq!(report.base_date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());

        let calls = caller.calls.lock().unwrap();
        let first: Vec<(&str, &str)> = calls
            .iter()
            .take(3)
            .map(|c| (c.get_str("REGION").unwrap(), c.get_str("MONTH").unwrap()))
            .collect();
        assert_eq!(
            first,
            vec![("11110", "202401"), ("11110", "202402"), ("11110", "202403")]
        );
        assert!(calls.iter().all(|c| c.get_str("serviceKey") == Some("k")));
    }

    #[tokio::test]
    async fn failing_source_empties_matrix_but_run_completes() {
        let mut job = matrix_job();
        job.parameter_sources[1].source_spec = "{not json".to_string();
        let caller = Arc::new(RecordingCaller::default());
        let report = pipeline(caller.clone()).execute(&job).await.unwrap();

        assert_eq!(report.total_combinations, 0);
        assert_eq!(report.batch_count, 0);
        assert_eq!(report.run.processed(), 0);
        assert_eq!(report.run.state, RunState::Completed);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            ExpansionWarning::Source(w) if w.parameter == "MONTH"
        ));
        assert!(caller.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_failures_are_counted_not_raised() {
        let caller = Arc::new(RecordingCaller {
            fail_when: Some(("REGION", "26110")),
            ..RecordingCaller::default()
        });
        let report = pipeline(caller).execute(&matrix_job()).await.unwrap();
        assert_eq!(report.run.success_count, 3);
        assert_eq!(report.run.fail_count, 3);
    }

    #[tokio::test]
    async fn invalid_job_makes_no_calls() {
        let caller = Arc::new(RecordingCaller::default());
        let err = pipeline(caller.clone())
            .execute(&job(serde_json::json!({"batch_size": 0})))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
        assert!(caller.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_mode_calls_once() {
        let caller = Arc::new(RecordingCaller::default());
        let report = pipeline(caller.clone())
            .execute(&job(serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(report.total_combinations, 1);
        assert_eq!(report.run.success_count, 1);
        assert_eq!(caller.calls.lock().unwrap()[0].get_str("serviceKey"), Some("k"));
    }

    #[tokio::test]
    async fn plan_groups_without_calling() {
        let caller = Arc::new(RecordingCaller::default());
        let plan = pipeline(caller.clone()).plan(&matrix_job()).await.unwrap();
        let sizes: Vec<usize> = plan.batches.iter().map(ExecutionBatch::len).collect();
        assert_eq!(sizes, vec![4, 2]);
        assert!(caller.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_pipeline_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let caller = Arc::new(RecordingCaller::default());
        let report = pipeline(caller.clone())
            .with_cancellation(cancel)
            .execute(&matrix_job())
            .await
            .unwrap();
        assert!(report.run.cancelled);
        assert_eq!(report.run.state, RunState::Cancelled);
        assert_eq!(report.total_combinations, 6);
        assert!(caller.calls.lock().unwrap().is_empty());
    }
}
