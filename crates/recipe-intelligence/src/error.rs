use forkful_common::gemini::GeminiError;

/// Failure classification for intelligence operations.
///
/// The three upstream-facing kinds match what callers need to decide on:
/// `Validation` never reached the network, `UpstreamFormat` will not improve
/// on retry, `Transport` might. `Cancelled` is the caller's own doing.
/// Callers typically surface one generic failure message and keep the kind
/// for logs.
#[derive(Debug, thiserror::Error)]
pub enum IntelligenceError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("upstream response violated the expected contract: {detail}")]
    UpstreamFormat { detail: String },

    #[error("upstream request failed: {0}")]
    Transport(#[source] GeminiError),

    #[error("operation cancelled before completion")]
    Cancelled,
}

/// Flat view of [`IntelligenceError`] for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    UpstreamFormat,
    Transport,
    Cancelled,
}

impl IntelligenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UpstreamFormat { .. } => ErrorKind::UpstreamFormat,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a retry could plausibly succeed. Only transport failures
    /// qualify: bad input and contract violations are deterministic.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Classify a low-level client failure.
    ///
    /// Refusals (blocked prompts, empty candidate lists) and undecodable
    /// envelopes count as format violations: the request completed but the
    /// upstream did not honor the contract. Everything else is transport.
    pub(crate) fn from_upstream(err: GeminiError) -> Self {
        match err {
            GeminiError::InvalidEnvelope(e) => Self::UpstreamFormat {
                detail: format!("undecodable response envelope: {e}"),
            },
            GeminiError::Blocked { reason } => Self::UpstreamFormat {
                detail: format!("prompt blocked by upstream: {reason}"),
            },
            GeminiError::EmptyResponse => Self::UpstreamFormat {
                detail: "upstream returned no candidate text".to_string(),
            },
            other => Self::Transport(other),
        }
    }
}
