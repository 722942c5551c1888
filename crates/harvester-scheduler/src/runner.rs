use std::time::Duration;

use async_trait::async_trait;
use harvester_core::{HttpMethod, JobDefinition, ParameterCombination};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::ExecutionBatch;

/// Failure of a single external call. Recorded, never propagated.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// The external API a job calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub url: String,
    pub method: HttpMethod,
}

impl CallTarget {
    pub fn for_job(job: &JobDefinition) -> Self {
        Self {
            url: job.resource_url.clone(),
            method: job.http_method,
        }
    }
}

/// Performs one external call per parameter combination.
///
/// Retry policy, if any, belongs inside the implementation; the runner
/// calls each combination exactly once.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    async fn invoke(
        &self,
        url: &str,
        method: HttpMethod,
        params: &ParameterCombination,
    ) -> Result<String, CallError>;
}

/// Result of one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub batch_index: usize,
    pub parameters: ParameterCombination,
    pub succeeded: bool,
    pub error: Option<String>,
    /// Body length on success.
    pub response_bytes: usize,
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    /// Every combination was attempted.
    Completed,
    /// Stopped between calls; counts cover only what was attempted.
    Cancelled,
}

/// Aggregate of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub success_count: usize,
    pub fail_count: usize,
    pub cancelled: bool,
    pub outcomes: Vec<ExecutionOutcome>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.success_count + self.fail_count
    }

    /// First recorded call error, if any call failed.
    pub fn first_error(&self) -> Option<&str> {
        self.outcomes.iter().find_map(|o| o.error.as_deref())
    }
}

/// Executes batches strictly in order, one call in flight at a time.
pub struct ExecutionRunner {
    delay: Duration,
    cancel: CancellationToken,
}

impl ExecutionRunner {
    /// `delay` is slept after every successful call that has a successor.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        batches: &[ExecutionBatch],
        caller: &dyn ApiCaller,
        target: &CallTarget,
    ) -> RunReport {
        let mut report = RunReport {
            state: RunState::Running,
            ..RunReport::default()
        };
        let total: usize = batches.iter().map(ExecutionBatch::len).sum();
        let mut attempted = 0usize;

        'batches: for batch in batches {
            info!(
                batch = batch.index + 1,
                of = batches.len(),
                size = batch.len(),
                "batch started"
            );

            for params in batch.iter() {
                // Checked between calls only; an in-flight call always finishes.
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'batches;
                }
                attempted += 1;

                match caller.invoke(&target.url, target.method, params).await {
                    Ok(body) => {
                        debug!(batch = batch.index + 1, bytes = body.len(), "call succeeded");
                        report.success_count += 1;
                        report.outcomes.push(ExecutionOutcome {
                            batch_index: batch.index,
                            parameters: params.clone(),
                            succeeded: true,
                            error: None,
                            response_bytes: body.len(),
                        });
                        // Only successes are followed by the pause; failures move on at once.
                        if !self.delay.is_zero() && attempted < total {
                            self.pause().await;
                        }
                    }
                    Err(e) => {
                        warn!(batch = batch.index + 1, error = %e, params = ?params, "call failed");
                        report.fail_count += 1;
                        report.outcomes.push(ExecutionOutcome {
                            batch_index: batch.index,
                            parameters: params.clone(),
                            succeeded: false,
                            error: Some(e.to_string()),
                            response_bytes: 0,
                        });
                    }
                }
            }

            info!(batch = batch.index + 1, of = batches.len(), "batch finished");
        }

        report.state = if report.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        info!(
            success = report.success_count,
            failed = report.fail_count,
            cancelled = report.cancelled,
            "run finished"
        );
        if report.fail_count > 0 {
            warn!(failed = report.fail_count, "some calls failed");
        }
        report
    }

    async fn pause(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = self.cancel.cancelled() => {
                debug!("inter-call delay interrupted by cancellation");
            }
        }
    }
}
