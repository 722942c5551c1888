use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvesterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job definition ({job_code}): {reason}")]
    InvalidJob { job_code: String, reason: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl HarvesterError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            HarvesterError::Config(_) => "CONFIG_ERROR",
            HarvesterError::InvalidJob { .. } => "INVALID_JOB",
            HarvesterError::InvalidParameters(_) => "INVALID_PARAMETERS",
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let invalid = HarvesterError::InvalidJob {
            job_code: "X".to_string(),
            reason: "batch_size must be at least 1".to_string(),
        };
        assert_eq!(invalid.code(), "INVALID_JOB");
        assert_eq!(invalid.to_string(), "Invalid job definition (X): batch_size must be at least 1");
        assert_eq!(HarvesterError::Config(String::new()).code(), "CONFIG_ERROR");
        assert_eq!(
            HarvesterError::InvalidParameters(String::new()).code(),
            "INVALID_PARAMETERS"
        );
    }
}
