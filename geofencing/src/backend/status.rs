//! Completion statuses reported by the location backend.

use std::fmt;

/// Status codes the backend delivers to a completion target.
///
/// Numeric values follow the backend's status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    /// Generic backend failure.
    Error,
    /// The call was interrupted before it completed.
    Interrupted,
    /// The call timed out.
    Timeout,
    /// The call was canceled.
    Canceled,
    /// Location monitoring is unavailable (e.g. location turned off).
    GeofenceNotAvailable,
    /// The application registered more geofences than the backend allows.
    TooManyGeofences,
    /// Too many distinct callback targets were supplied.
    TooManyPendingIntents,
}

impl StatusCode {
    /// Numeric code as reported by the backend.
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::Error => 13,
            StatusCode::Interrupted => 14,
            StatusCode::Timeout => 15,
            StatusCode::Canceled => 16,
            StatusCode::GeofenceNotAvailable => 1000,
            StatusCode::TooManyGeofences => 1001,
            StatusCode::TooManyPendingIntents => 1002,
        }
    }

    /// Map a numeric code back; unknown codes become [`StatusCode::Error`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => StatusCode::Success,
            14 => StatusCode::Interrupted,
            15 => StatusCode::Timeout,
            16 => StatusCode::Canceled,
            1000 => StatusCode::GeofenceNotAvailable,
            1001 => StatusCode::TooManyGeofences,
            1002 => StatusCode::TooManyPendingIntents,
            _ => StatusCode::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::Error => "ERROR",
            StatusCode::Interrupted => "INTERRUPTED",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::Canceled => "CANCELED",
            StatusCode::GeofenceNotAvailable => "GEOFENCE_NOT_AVAILABLE",
            StatusCode::TooManyGeofences => "GEOFENCE_TOO_MANY_GEOFENCES",
            StatusCode::TooManyPendingIntents => "GEOFENCE_TOO_MANY_PENDING_INTENTS",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one add or remove call, delivered asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationStatus {
    pub code: StatusCode,
    /// Optional human-readable detail from the backend.
    pub message: Option<String>,
}

impl RegistrationStatus {
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            message: None,
        }
    }

    pub fn failure(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_code(code: StatusCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({}): {}", self.code, self.code.code(), message),
            None => write!(f, "{} ({})", self.code, self.code.code()),
        }
    }
}
