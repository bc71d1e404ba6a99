use thiserror::Error;

/// Failures surfaced by `ChatEngine::process_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("knowledge base retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("language model request failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("language model returned an empty reply")]
    EmptyReply,
}

impl PipelineError {
    /// Stable label for logs and transport error codes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::Retrieval(_) => "retrieval_failed",
            Self::Generation(_) => "generation_failed",
            Self::EmptyReply => "empty_reply",
        }
    }
}
