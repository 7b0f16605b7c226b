use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by every marketplace operation.
///
/// Repository errors are converted into this type at the store boundary and
/// propagated unchanged by the services. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// Missing or invalid input, detected before any write.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The acting user may not perform this mutation.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Status change attempted from a terminal or mismatched state.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The acting user is neither the requester nor the poster.
    #[error("User {user} is not a party to request {request}")]
    Role { user: Uuid, request: Uuid },

    #[error("{0} not found")]
    NotFound(String),

    /// Opaque failure of the storage or payment backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_names_both_states() {
        let err = MarketError::transition("completed", "pending");
        assert_eq!(
            err.to_string(),
            "Invalid status transition: completed -> pending"
        );
    }

    #[test]
    fn role_message_names_user_and_request() {
        let user = Uuid::nil();
        let request = Uuid::nil();
        let msg = MarketError::Role { user, request }.to_string();
        assert!(msg.contains("is not a party to request"));
    }
}
