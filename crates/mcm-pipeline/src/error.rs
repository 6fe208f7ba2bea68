/// Errors raised while running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A handler returned an error. The handler's error is kept unchanged
    /// as the source.
    #[error("handler '{handler}' failed on {candidate}: {source}")]
    HandlerFault {
        handler: String,
        candidate: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub(crate) fn fault(handler: &str, candidate: &str, source: anyhow::Error) -> Self {
        Self::HandlerFault {
            handler: handler.to_owned(),
            candidate: candidate.to_owned(),
            source,
        }
    }

    /// Name of the handler that failed.
    pub fn handler(&self) -> &str {
        match self {
            Self::HandlerFault { handler, .. } => handler,
        }
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
