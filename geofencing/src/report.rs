//! Error reporting for fire-and-forget registration.
//!
//! Registration failures never reach the manager's caller. They end at an
//! [`ErrorReporter`], which in production is [`TracingReporter`]: every
//! reported error becomes one `tracing::error!` event.

use thiserror::Error;

use crate::backend::{BackendError, RegistrationStatus};

/// Failures surfaced through the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofenceError {
    /// The backend refused a call synchronously because the location
    /// permission is missing.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend refused a call synchronously for another reason.
    #[error("Backend call rejected: {0}")]
    CallRejected(String),

    /// The backend accepted a call and later reported a non-success status.
    #[error("Geofence request failed: {0}")]
    RegistrationFailed(RegistrationStatus),
}

impl From<BackendError> for GeofenceError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::PermissionDenied(msg) => GeofenceError::PermissionDenied(msg),
            BackendError::Unavailable(msg) => GeofenceError::CallRejected(msg),
        }
    }
}

/// Terminal sink for registration failures. Must not panic.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &GeofenceError);
}

/// Reports errors as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &GeofenceError) {
        match error {
            GeofenceError::RegistrationFailed(status) => {
                tracing::error!(code = status.code.code(), "{}", error);
            }
            _ => tracing::error!("{}", error),
        }
    }
}
