//! Location backend contract.
//!
//! The backend itself is an external service. This module describes the part
//! of it the manager consumes:
//!
//! - [`BackendSession`] - the connection handle; only its connectivity is read
//! - [`GeofencingApi`] - `add_regions` / `remove_regions`, each returning a
//!   [`PendingResult`] or failing synchronously with a [`BackendError`]
//! - [`CallbackTargetFactory`] - builds the [`CallbackToken`] that routes
//!   completions and transition broadcasts back to the application
//!
//! [`memory`] provides an in-process implementation of all three.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use geofencing::backend::{pending_result, ResultCallback, RegistrationStatus};
//!
//! struct Print;
//! impl ResultCallback for Print {
//!     fn on_result(&self, status: RegistrationStatus) {
//!         println!("completed: {}", status);
//!     }
//! }
//!
//! let (sender, pending) = pending_result();
//! pending.set_result_callback(Arc::new(Print));
//! sender.complete(RegistrationStatus::success());
//! ```

pub mod memory;
mod pending;
mod status;

pub use pending::{pending_result, PendingResult, ResultCallback, ResultSender};
pub use status::{RegistrationStatus, StatusCode};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::geofence::RegistrationRequest;

/// Default name of the component that receives transition broadcasts.
pub const DEFAULT_BROADCAST_TARGET: &str = "GeofenceBroadcastReceiver";

/// Synchronous failures of a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The application lacks the runtime location permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend refused the call for another reason.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Connection handle to the location backend.
///
/// Owned by the host; the manager only checks connectivity and never
/// connects, reconnects or closes it.
pub trait BackendSession: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Region monitoring calls offered by the backend.
///
/// Both calls return immediately. Their outcome arrives later through the
/// returned [`PendingResult`].
pub trait GeofencingApi: Send + Sync {
    /// Start monitoring every region in `request`, routing transitions and the
    /// completion to `target`.
    fn add_regions(
        &self,
        session: &dyn BackendSession,
        request: RegistrationRequest,
        target: &CallbackToken,
    ) -> Result<PendingResult, BackendError>;

    /// Stop monitoring every region registered with `target`.
    fn remove_regions(
        &self,
        session: &dyn BackendSession,
        target: &CallbackToken,
    ) -> Result<PendingResult, BackendError>;
}

/// Builds callback tokens; stands in for the application context.
pub trait CallbackTargetFactory: Send + Sync {
    fn create_target(&self) -> CallbackToken;
}

/// Opaque routing handle for backend completions and transition broadcasts.
///
/// Cheap to clone. Two tokens are equal when they were created as the same
/// token, regardless of target name.
#[derive(Clone)]
pub struct CallbackToken {
    id: u64,
    target: Arc<str>,
}

impl CallbackToken {
    pub fn new(id: u64, target: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            target: target.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the component the backend delivers broadcasts to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl PartialEq for CallbackToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CallbackToken {}

impl std::hash::Hash for CallbackToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackToken({}#{})", self.target, self.id)
    }
}

/// Factory producing tokens for a single broadcast target.
#[derive(Debug)]
pub struct BroadcastTargetFactory {
    target: Arc<str>,
    next_id: AtomicU64,
}

impl BroadcastTargetFactory {
    pub fn new(target: impl Into<Arc<str>>) -> Self {
        Self {
            target: target.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of tokens handed out so far.
    pub fn created(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for BroadcastTargetFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_TARGET)
    }
}

impl CallbackTargetFactory for BroadcastTargetFactory {
    fn create_target(&self) -> CallbackToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        CallbackToken {
            id,
            target: Arc::clone(&self.target),
        }
    }
}
