/// Errors returned by bridge contract operations.
///
/// One variant per failure kind; both transports map their engine errors
/// into these, preserving the underlying cause in `reason`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HubError {
    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("publish error on {channel:?}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("subscribe error on {channel:?}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("broker start error: {reason}")]
    Start { reason: String },

    #[error("broker stop error: {reason}")]
    Stop { reason: String },

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },
}

impl HubError {
    /// Returns `true` for transient transport errors that may succeed on
    /// retry. Malformed payloads and unsupported operations never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Publish { .. } | Self::Start { .. }
        )
    }

    pub fn connection(reason: impl ToString) -> Self {
        Self::Connection {
            reason: reason.to_string(),
        }
    }

    pub fn publish(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self::Subscribe {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }

    pub fn start(reason: impl ToString) -> Self {
        Self::Start {
            reason: reason.to_string(),
        }
    }

    pub fn stop(reason: impl ToString) -> Self {
        Self::Stop {
            reason: reason.to_string(),
        }
    }

    pub fn malformed_payload(reason: impl ToString) -> Self {
        Self::MalformedPayload {
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}
