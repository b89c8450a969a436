use thiserror::Error;

/// Errors raised by the coordination service contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("Coordination service unavailable: session is not connected")]
    Unavailable,

    #[error("No node: {0}")]
    NoNode(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node has children: {0}")]
    NotEmpty(String),

    #[error("Version mismatch on {path}: expected {expected}, found {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Race lost: {0}")]
    RaceLost(String),

    #[error("Election did not settle after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Election identity lost: {0}")]
    IdentityLost(String),
}

pub type CoordinationResult<T> = Result<T, CoordinationError>;

impl CoordinationError {
    /// Check if the error can be recovered from by retrying the enclosing step
    pub fn is_recoverable(&self) -> bool {
        match self {
            CoordinationError::Unavailable => false,
            CoordinationError::NoNode(_) => true,
            CoordinationError::NodeExists(_) => false,
            CoordinationError::NotEmpty(_) => false,
            CoordinationError::BadVersion { .. } => true,
            CoordinationError::InvalidPath(_) => false,
            CoordinationError::RaceLost(_) => true,
            CoordinationError::RetriesExhausted { .. } => true,
            CoordinationError::IdentityLost(_) => false,
        }
    }

    /// Get the error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            CoordinationError::Unavailable => "session",
            CoordinationError::NoNode(_) => "node",
            CoordinationError::NodeExists(_) => "node",
            CoordinationError::NotEmpty(_) => "node",
            CoordinationError::BadVersion { .. } => "node",
            CoordinationError::InvalidPath(_) => "validation",
            CoordinationError::RaceLost(_) => "race",
            CoordinationError::RetriesExhausted { .. } => "race",
            CoordinationError::IdentityLost(_) => "session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests the display format of the session error.
    ///
    /// # Purpose
    /// The operator-visible message for a lost session must say so plainly.
    ///
    /// # Steps
    /// 1. Format [`CoordinationError::Unavailable`].
    /// 2. Verify the message.
    #[test]
    fn test_unavailable_display() {
        let error = CoordinationError::Unavailable;
        assert_eq!(
            format!("{}", error),
            "Coordination service unavailable: session is not connected"
        );
    }

    /// Tests the recoverability classification.
    ///
    /// # Purpose
    /// Races are retried locally while session loss is not.
    ///
    /// # Steps
    /// 1. Classify a race, a missing node and a lost session.
    /// 2. Verify only the first two are recoverable.
    #[test]
    fn test_recoverable_classification() {
        assert!(CoordinationError::RaceLost("c_0000000001".to_string()).is_recoverable());
        assert!(CoordinationError::NoNode("/election/c_1".to_string()).is_recoverable());
        assert!(!CoordinationError::Unavailable.is_recoverable());
        assert_eq!(CoordinationError::Unavailable.category(), "session");
    }
}
