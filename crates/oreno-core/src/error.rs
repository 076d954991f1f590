use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("turn index {index} out of range (log has {len} turns)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The request never started: blank prompt, unreachable provider, or a
    /// provider that rejected the request outright.
    #[error("failed to start agent session: {0}")]
    Creation(String),
}
