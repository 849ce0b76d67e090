//! Error taxonomy for the pipeline.
//!
//! Computation itself never fails: every division in the aggregation engine
//! is guarded by an explicit zero-check and returns 0 instead of NaN or
//! infinity, so there is deliberately no computation variant here.

use thiserror::Error;

/// Errors a pipeline run can surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input produced no usable publisher records. Fatal for the run.
    #[error("input error: {0}")]
    Input(String),

    /// A snapshot read or write failed. Whatever was written before the
    /// failure is not rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A downstream collaborator (narrative, export) failed. Isolated from
    /// the core: already-persisted snapshots stay valid.
    #[error("integration error: {0}")]
    Integration(String),
}

impl PipelineError {
    pub fn input(message: impl Into<String>) -> Self {
        PipelineError::Input(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        PipelineError::Persistence(message.into())
    }

    /// Wrap an I/O error with the path or operation that failed.
    pub fn persistence_io(context: &str, err: std::io::Error) -> Self {
        PipelineError::Persistence(format!("{}: {}", context, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::input("no resolvable publisher rows");
        assert_eq!(err.to_string(), "input error: no resolvable publisher rows");

        let err = PipelineError::persistence_io(
            "writing metrics.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("writing metrics.json"));
    }
}
