//! One-shot completion handles for backend calls.
//!
//! Every add/remove call returns a [`PendingResult`]. The caller attaches a
//! [`ResultCallback`] to it; the backend later completes the paired
//! [`ResultSender`] from its own execution context. Attaching and completing
//! may happen in either order and the callback fires exactly once. If the
//! sender is dropped without completing, the call is considered lost and the
//! callback never fires.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::status::RegistrationStatus;

/// Receives the outcome of an add or remove call.
///
/// One implementation serves both call types: the status payload does not say
/// which operation completed.
pub trait ResultCallback: Send + Sync {
    /// Handle a completed call. Must not panic.
    fn on_result(&self, status: RegistrationStatus);
}

enum Slot {
    Waiting,
    Completed(RegistrationStatus),
    Attached(Arc<dyn ResultCallback>),
    Delivered,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Waiting => write!(f, "Waiting"),
            Slot::Completed(status) => write!(f, "Completed({})", status),
            Slot::Attached(_) => write!(f, "Attached"),
            Slot::Delivered => write!(f, "Delivered"),
        }
    }
}

/// Create a connected sender/handle pair for one backend call.
pub fn pending_result() -> (ResultSender, PendingResult) {
    let slot = Arc::new(Mutex::new(Slot::Waiting));
    (
        ResultSender {
            slot: Arc::clone(&slot),
        },
        PendingResult { slot },
    )
}

/// Backend side of a pending call.
#[derive(Debug)]
pub struct ResultSender {
    slot: Arc<Mutex<Slot>>,
}

impl ResultSender {
    /// Deliver the call's outcome.
    ///
    /// Runs the attached callback on the current thread, or stores the
    /// status until a callback is attached.
    pub fn complete(self, status: RegistrationStatus) {
        let callback = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Delivered) {
                Slot::Attached(callback) => Some(callback),
                Slot::Waiting => {
                    *slot = Slot::Completed(status.clone());
                    None
                }
                other => {
                    *slot = other;
                    None
                }
            }
        };

        // Invoke outside the lock so the callback may start new calls.
        if let Some(callback) = callback {
            callback.on_result(status);
        }
    }
}

/// Caller side of a pending call.
#[derive(Debug)]
pub struct PendingResult {
    slot: Arc<Mutex<Slot>>,
}

impl PendingResult {
    /// Attach the completion target for this call.
    pub fn set_result_callback(self, callback: Arc<dyn ResultCallback>) {
        let status = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Delivered) {
                Slot::Completed(status) => Some(status),
                Slot::Waiting => {
                    *slot = Slot::Attached(Arc::clone(&callback));
                    None
                }
                other => {
                    *slot = other;
                    None
                }
            }
        };

        if let Some(status) = status {
            callback.on_result(status);
        }
    }

    /// Whether the backend has already completed this call.
    pub fn is_completed(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Completed(_) | Slot::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StatusCode;

    #[derive(Default)]
    struct Collect(Mutex<Vec<RegistrationStatus>>);

    impl ResultCallback for Collect {
        fn on_result(&self, status: RegistrationStatus) {
            self.0.lock().push(status);
        }
    }

    #[test]
    fn test_callback_attached_before_completion() {
        let (sender, pending) = pending_result();
        let collect = Arc::new(Collect::default());

        pending.set_result_callback(collect.clone());
        assert!(collect.0.lock().is_empty());

        sender.complete(RegistrationStatus::success());
        assert_eq!(collect.0.lock().as_slice(), &[RegistrationStatus::success()]);
    }

    #[test]
    fn test_completion_before_callback_attached() {
        let (sender, pending) = pending_result();
        let collect = Arc::new(Collect::default());

        sender.complete(RegistrationStatus::from_code(StatusCode::Timeout));
        assert!(pending.is_completed());

        pending.set_result_callback(collect.clone());
        let statuses = collect.0.lock();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].code, StatusCode::Timeout);
    }

    #[test]
    fn test_dropped_sender_never_fires() {
        let (sender, pending) = pending_result();
        let collect = Arc::new(Collect::default());

        drop(sender);
        assert!(!pending.is_completed());
        pending.set_result_callback(collect.clone());
        assert!(collect.0.lock().is_empty());
    }

    #[test]
    fn test_completion_from_other_thread() {
        let (sender, pending) = pending_result();
        let collect = Arc::new(Collect::default());
        pending.set_result_callback(collect.clone());

        std::thread::spawn(move || sender.complete(RegistrationStatus::success()))
            .join()
            .unwrap();

        assert_eq!(collect.0.lock().len(), 1);
    }
}
