use thiserror::Error;

use crate::types::{DocumentId, StoreKind};

/// Error taxonomy for the reconciliation engine and scheduler.
///
/// Per-key delete failures inside a batch are deliberately NOT part of this
/// enum; they are data, reported in `CleanupResult.errors`, so a batch can
/// finish partially instead of failing fast.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("maintenance lock held by '{holder}', rejected '{operation}'")]
    Busy { operation: String, holder: String },

    #[error("{store} store unavailable: {message}")]
    StoreUnavailable { store: StoreKind, message: String },

    #[error("no {store} record for '{id}'")]
    NotFound { store: StoreKind, id: DocumentId },

    #[error("audit log unavailable: {message}")]
    AuditUnavailable { message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

impl AdminError {
    pub fn store_unavailable(store: StoreKind, source: impl std::fmt::Display) -> Self {
        AdminError::StoreUnavailable {
            store,
            message: source.to_string(),
        }
    }

    pub fn audit_unavailable(source: impl std::fmt::Display) -> Self {
        AdminError::AuditUnavailable {
            message: source.to_string(),
        }
    }

    /// Message suitable for display in the admin dashboard
    pub fn user_message(&self) -> String {
        match self {
            AdminError::Busy { operation, .. } => {
                format!(
                    "Another maintenance job is running. '{}' was not started; try again later.",
                    operation
                )
            }
            AdminError::StoreUnavailable { store, .. } => {
                format!("The {} store did not respond. Check that it is running.", store)
            }
            AdminError::NotFound { store, id } => {
                format!("No {} record exists for '{}'.", store, id)
            }
            AdminError::AuditUnavailable { .. } => {
                "The deletion log could not be read or written.".to_string()
            }
            AdminError::Configuration { message } => {
                format!("Configuration problem: {}", message)
            }
        }
    }

    /// True when the caller should simply retry later
    pub fn is_busy(&self) -> bool {
        matches!(self, AdminError::Busy { .. })
    }
}

/// Result type alias for engine and scheduler operations
pub type AdminResult<T> = Result<T, AdminError>;
