//! Ledger error types with client/server classification.
//!
//! [`LedgerError`] is the central error type of the crate. Each variant
//! carries a numeric code so that an API layer in front of the services
//! can map it to a response without inspecting messages.

/// Error enum for every ledger operation.
///
/// # Error Code Ranges
///
/// | Range     | Category        | Caller-facing meaning        |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | client error, fix the input  |
/// | 2000–2999 | Not found / access | client error              |
/// | 3000–3999 | Server          | operation failed, may retry  |
///
/// A lost race to materialize the same recurring expense is not an
/// error; see `MaterializeOutcome::AlreadyPresent`.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity, e.g. `"group"`.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller may not act on the entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Storage collaborator failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound { .. } => 2001,
            Self::Forbidden(_) => 2100,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns `true` when the caller caused the failure and retrying the
    /// same request cannot succeed.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.error_code() < 3000
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row",
                id: "unknown".to_string(),
            },
            other => Self::Persistence(other.to_string()),
        }
    }
}
