use harvester_core::ParameterCombination;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, SchedulerError};

/// An ordered, non-empty chunk of combinations executed together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionBatch {
    /// Zero-based position of this batch in the run.
    pub index: usize,
    combinations: Vec<ParameterCombination>,
}

impl ExecutionBatch {
    pub fn combinations(&self) -> &[ParameterCombination] {
        &self.combinations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParameterCombination> {
        self.combinations.iter()
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn into_combinations(self) -> Vec<ParameterCombination> {
        self.combinations
    }
}

/// Split `combinations` into batches of at most `batch_size`, keeping order.
///
/// No input means no batches, never a single empty one.
pub fn group(
    combinations: Vec<ParameterCombination>,
    batch_size: usize,
) -> Result<Vec<ExecutionBatch>> {
    if batch_size == 0 {
        return Err(SchedulerError::InvalidArgument(
            "batch size must be at least 1".to_string(),
        ));
    }

    let total = combinations.len();
    let mut batches = Vec::with_capacity(total.div_ceil(batch_size));
    let mut rest = combinations.into_iter().peekable();
    while rest.peek().is_some() {
        let chunk: Vec<ParameterCombination> = rest.by_ref().take(batch_size).collect();
        batches.push(ExecutionBatch {
            index: batches.len(),
            combinations: chunk,
        });
    }

    info!(
        combinations = total,
        batches = batches.len(),
        batch_size,
        "combinations grouped into batches"
    );
    Ok(batches)
}
