//! In-process location backend.
//!
//! [`InMemoryGeofencingApi`] behaves like the real service closely enough to
//! drive the manager end to end: it keeps the regions registered per callback
//! token, enforces the per-application geofence limit, forgets regions once
//! they expire, and delivers completions asynchronously on a tokio runtime.
//! It can also simulate a missing location permission and scripted failures,
//! and records every call it receives.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geofencing::backend::memory::{InMemoryGeofencingApi, InMemorySession};
//!
//! let api = Arc::new(InMemoryGeofencingApi::new(tokio::runtime::Handle::current()));
//! let session = Arc::new(InMemorySession::connected());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::{
    pending_result, BackendError, BackendSession, CallbackToken, GeofencingApi, PendingResult,
    RegistrationStatus, StatusCode,
};
use crate::geofence::{GeofenceDefinition, RegistrationRequest};

/// Maximum number of active geofences per application.
pub const MAX_GEOFENCES_PER_APP: usize = 100;

/// Message attached to simulated permission faults.
pub const PERMISSION_DENIED_MESSAGE: &str = "Client must have ACCESS_FINE_LOCATION permission";

/// Session whose connectivity is toggled by hand.
#[derive(Debug, Default)]
pub struct InMemorySession {
    connected: AtomicBool,
}

impl InMemorySession {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn connected() -> Self {
        Self::new(true)
    }

    pub fn disconnected() -> Self {
        Self::new(false)
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl BackendSession for InMemorySession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// A call received by [`InMemoryGeofencingApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    AddRegions {
        target: CallbackToken,
        request: RegistrationRequest,
    },
    RemoveRegions {
        target: CallbackToken,
    },
}

impl BackendCall {
    pub fn target(&self) -> &CallbackToken {
        match self {
            BackendCall::AddRegions { target, .. } | BackendCall::RemoveRegions { target } => {
                target
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RegisteredRegion {
    definition: GeofenceDefinition,
    /// `None` when the expiration does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

impl RegisteredRegion {
    fn new(definition: GeofenceDefinition, now: Instant) -> Self {
        let expires_at = now.checked_add(definition.expiration());
        Self {
            definition,
            expires_at,
        }
    }

    fn is_active(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process implementation of [`GeofencingApi`].
pub struct InMemoryGeofencingApi {
    runtime: Handle,
    latency: Duration,
    max_geofences: usize,
    permission_granted: AtomicBool,
    scripted: Mutex<VecDeque<RegistrationStatus>>,
    regions: DashMap<CallbackToken, HashMap<String, RegisteredRegion>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl std::fmt::Debug for InMemoryGeofencingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGeofencingApi")
            .field("latency", &self.latency)
            .field("max_geofences", &self.max_geofences)
            .field("permission_granted", &self.permission_granted)
            .field("registered", &self.registered_count())
            .finish_non_exhaustive()
    }
}

impl InMemoryGeofencingApi {
    /// Create a backend delivering completions on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            latency: Duration::ZERO,
            max_geofences: MAX_GEOFENCES_PER_APP,
            permission_granted: AtomicBool::new(true),
            scripted: Mutex::new(VecDeque::new()),
            regions: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every completion by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the per-application geofence limit.
    pub fn with_max_geofences(mut self, max_geofences: usize) -> Self {
        self.max_geofences = max_geofences;
        self
    }

    /// Grant or revoke the location permission.
    pub fn set_permission_granted(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// Complete the next accepted call with `status` instead of applying it.
    pub fn fail_next(&self, status: RegistrationStatus) {
        self.scripted.lock().push_back(status);
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn add_call_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::AddRegions { .. }))
            .count()
    }

    pub fn remove_call_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::RemoveRegions { .. }))
            .count()
    }

    /// Ids of the active regions registered with `target`, sorted.
    pub fn registered_ids(&self, target: &CallbackToken) -> Vec<String> {
        let now = Instant::now();
        let mut ids: Vec<String> = self
            .regions
            .get(target)
            .map(|regions| {
                regions
                    .values()
                    .filter(|r| r.is_active(now))
                    .map(|r| r.definition.id().to_string())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Center of the active region `id` registered with `target`.
    pub fn registered_center(&self, target: &CallbackToken, id: &str) -> Option<(f64, f64)> {
        let now = Instant::now();
        self.regions
            .get(target)?
            .get(id)
            .filter(|r| r.is_active(now))
            .map(|r| r.definition.center())
    }

    /// Number of active regions across all targets.
    pub fn registered_count(&self) -> usize {
        let now = Instant::now();
        self.regions
            .iter()
            .map(|entry| entry.value().values().filter(|r| r.is_active(now)).count())
            .sum()
    }

    fn check_call(&self, session: &dyn BackendSession) -> Result<(), BackendError> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(BackendError::PermissionDenied(
                PERMISSION_DENIED_MESSAGE.to_string(),
            ));
        }
        if !session.is_connected() {
            return Err(BackendError::Unavailable(
                "session is not connected".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_add(&self, target: &CallbackToken, request: RegistrationRequest) -> RegistrationStatus {
        let now = Instant::now();

        let others: usize = self
            .regions
            .iter()
            .filter(|entry| entry.key() != target)
            .map(|entry| entry.value().values().filter(|r| r.is_active(now)).count())
            .sum();

        let mut regions = self.regions.entry(target.clone()).or_default();
        regions.retain(|_, r| r.is_active(now));

        let new_ids = request
            .geofences()
            .iter()
            .filter(|d| !regions.contains_key(d.id()))
            .count();
        let total = others + regions.len() + new_ids;
        if total > self.max_geofences {
            return RegistrationStatus::failure(
                StatusCode::TooManyGeofences,
                format!("{} geofences exceed the limit of {}", total, self.max_geofences),
            );
        }

        for definition in request.into_geofences() {
            regions.insert(
                definition.id().to_string(),
                RegisteredRegion::new(definition, now),
            );
        }
        RegistrationStatus::success()
    }

    fn apply_remove(&self, target: &CallbackToken) -> RegistrationStatus {
        self.regions.remove(target);
        RegistrationStatus::success()
    }

    fn scripted_status(&self) -> Option<RegistrationStatus> {
        self.scripted.lock().pop_front()
    }

    fn dispatch(&self, status: RegistrationStatus) -> PendingResult {
        let (sender, pending) = pending_result();
        let latency = self.latency;
        self.runtime.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            sender.complete(status);
        });
        pending
    }
}

impl GeofencingApi for InMemoryGeofencingApi {
    fn add_regions(
        &self,
        session: &dyn BackendSession,
        request: RegistrationRequest,
        target: &CallbackToken,
    ) -> Result<PendingResult, BackendError> {
        self.check_call(session)?;
        self.calls.lock().push(BackendCall::AddRegions {
            target: target.clone(),
            request: request.clone(),
        });

        let status = match self.scripted_status() {
            Some(status) => status,
            None => self.apply_add(target, request),
        };
        tracing::trace!(target_id = target.id(), %status, "In-memory add_regions");
        Ok(self.dispatch(status))
    }

    fn remove_regions(
        &self,
        session: &dyn BackendSession,
        target: &CallbackToken,
    ) -> Result<PendingResult, BackendError> {
        self.check_call(session)?;
        self.calls.lock().push(BackendCall::RemoveRegions {
            target: target.clone(),
        });

        let status = match self.scripted_status() {
            Some(status) => status,
            None => self.apply_remove(target),
        };
        tracing::trace!(target_id = target.id(), %status, "In-memory remove_regions");
        Ok(self.dispatch(status))
    }
}
