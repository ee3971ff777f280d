//! Geofence set manager.
//!
//! Owns the current [`GeofenceSet`] and drives its registration with the
//! location backend.
//!
//! # Lifecycle
//!
//! ```text
//! [Unregistered] --rebuild_set--> [Unregistered]           (local only)
//! [Unregistered] --register_all--> [RegisterPending]       (preconditions met)
//! [RegisterPending] --on_result--> [Registered or not]     (local set untouched)
//! [Registered] --unregister_all--> [UnregisterPending]     (session connected)
//! [UnregisterPending] --on_result--> [Unregistered]
//! ```
//!
//! The manager is optimistic. It never records whether the backend actually
//! holds the regions: a skipped, lost or failed call only shows up in the log
//! and in [`RegistrationStats`].
//!
//! # Concurrency
//!
//! All operations take `&self`, return immediately and never wait on the
//! backend. The set and the cached callback token sit behind one mutex, which
//! is never held across a backend call. Completions of overlapping calls may
//! arrive in any order.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{
    BackendError, BackendSession, CallbackTargetFactory, CallbackToken, GeofencingApi,
    RegistrationStatus, ResultCallback,
};
use crate::config::{ConfigError, GeofenceConfig};
use crate::geofence::{GeofenceSet, PlaceRecord, RegistrationRequest};
use crate::report::{ErrorReporter, GeofenceError, TracingReporter};
use crate::stats::{RegistrationStats, StatsSnapshot};

/// Why a register/unregister call was not sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The manager was built without a backend session.
    NoSession,
    /// The session exists but is not connected.
    Disconnected,
    /// There are no geofences to register.
    EmptySet,
}

/// What a register/unregister call did.
///
/// Informational only: failures have already been reported by the time this
/// is returned, and ignoring it is fine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The call was handed to the backend; exactly one completion will follow
    /// unless the backend loses the call.
    Dispatched,
    /// A precondition was not met; nothing was sent and no completion follows.
    Skipped(SkipReason),
    /// The backend refused the call synchronously; the error was reported.
    Rejected(GeofenceError),
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched)
    }
}

/// Shared completion target for register and unregister calls.
///
/// Success needs no action since the local set was updated before the call
/// went out. Failures go to the reporter.
pub struct RegistrationResultHandler {
    reporter: Arc<dyn ErrorReporter>,
    stats: Arc<RegistrationStats>,
}

impl RegistrationResultHandler {
    pub fn new(reporter: Arc<dyn ErrorReporter>, stats: Arc<RegistrationStats>) -> Self {
        Self { reporter, stats }
    }
}

impl ResultCallback for RegistrationResultHandler {
    fn on_result(&self, status: RegistrationStatus) {
        self.stats.completed(status.is_success());
        if status.is_success() {
            tracing::debug!("Geofence request completed");
            return;
        }
        self.reporter.report(&GeofenceError::RegistrationFailed(status));
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    geofences: GeofenceSet,
    callback_token: Option<CallbackToken>,
}

/// Manages a set of geofences and their registration with the backend.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use geofencing::{GeofenceSetManager, PlaceRecord};
/// use geofencing::backend::BroadcastTargetFactory;
///
/// let manager = GeofenceSetManager::new(api, Some(session), Arc::new(BroadcastTargetFactory::default()));
/// manager.rebuild_set(&[PlaceRecord::new("A", 1.0, 1.0), PlaceRecord::new("B", 2.0, 2.0)]);
/// manager.register_all();
/// ```
pub struct GeofenceSetManager {
    config: GeofenceConfig,
    api: Arc<dyn GeofencingApi>,
    session: Option<Arc<dyn BackendSession>>,
    targets: Arc<dyn CallbackTargetFactory>,
    handler: Arc<RegistrationResultHandler>,
    stats: Arc<RegistrationStats>,
    state: Mutex<ManagerState>,
}

impl fmt::Debug for GeofenceSetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeofenceSetManager")
            .field("config", &self.config)
            .field("has_session", &self.session.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl GeofenceSetManager {
    /// Create a manager with the default configuration, reporting failures
    /// through `tracing`.
    ///
    /// # Arguments
    ///
    /// * `api` - Backend region monitoring calls
    /// * `session` - Backend connection, if the host has one
    /// * `targets` - Builds the callback token on first use
    pub fn new(
        api: Arc<dyn GeofencingApi>,
        session: Option<Arc<dyn BackendSession>>,
        targets: Arc<dyn CallbackTargetFactory>,
    ) -> Self {
        let stats = Arc::new(RegistrationStats::new());
        let handler = Arc::new(RegistrationResultHandler::new(
            Arc::new(TracingReporter),
            Arc::clone(&stats),
        ));
        Self {
            config: GeofenceConfig::default(),
            api,
            session,
            targets,
            handler,
            stats,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Use `config` for geofences built from now on.
    pub fn with_config(mut self, config: GeofenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Send failures to `reporter` instead of `tracing`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.handler = Arc::new(RegistrationResultHandler::new(
            reporter,
            Arc::clone(&self.stats),
        ));
        self
    }

    /// Configuration used for new geofence sets.
    pub fn config(&self) -> &GeofenceConfig {
        &self.config
    }

    /// Replace the managed set with one geofence per place.
    ///
    /// The previous set is discarded, not merged. An empty slice leaves an
    /// empty set, which disables registration. Nothing is sent to the backend.
    pub fn rebuild_set(&self, places: &[PlaceRecord]) {
        let geofences = GeofenceSet::from_places(places, &self.config);
        let count = geofences.len();

        self.state.lock().geofences = geofences;

        tracing::info!(
            count,
            discarded = places.len() - count,
            "Rebuilt geofence set"
        );
    }

    /// Register every geofence in the set with the backend.
    ///
    /// Skipped unless the session is present and connected and the set is
    /// non-empty. A synchronous backend refusal is reported and not retried.
    pub fn register_all(&self) -> DispatchOutcome {
        let session = match self.connected_session() {
            Ok(session) => session,
            Err(reason) => return self.skip("register", reason),
        };

        let (request, token) = {
            let mut state = self.state.lock();
            if state.geofences.is_empty() {
                drop(state);
                return self.skip("register", SkipReason::EmptySet);
            }
            let request =
                RegistrationRequest::from_set(&state.geofences, self.config.initial_trigger);
            (request, self.token_or_create(&mut state))
        };

        let count = request.len();
        match self.api.add_regions(session.as_ref(), request, &token) {
            Ok(pending) => {
                self.stats.register_dispatched();
                tracing::debug!(count, target_id = token.id(), "Dispatched geofence registration");
                pending.set_result_callback(self.result_callback());
                DispatchOutcome::Dispatched
            }
            Err(e) => self.reject(e),
        }
    }

    /// Remove every geofence registered under the callback token.
    ///
    /// Skipped unless the session is present and connected. The local set is
    /// left as is and may be empty.
    pub fn unregister_all(&self) -> DispatchOutcome {
        let session = match self.connected_session() {
            Ok(session) => session,
            Err(reason) => return self.skip("unregister", reason),
        };

        let token = {
            let mut state = self.state.lock();
            self.token_or_create(&mut state)
        };

        match self.api.remove_regions(session.as_ref(), &token) {
            Ok(pending) => {
                self.stats.unregister_dispatched();
                tracing::debug!(target_id = token.id(), "Dispatched geofence removal");
                pending.set_result_callback(self.result_callback());
                DispatchOutcome::Dispatched
            }
            Err(e) => self.reject(e),
        }
    }

    /// Completion entry point for both register and unregister calls.
    pub fn on_registration_result(&self, status: RegistrationStatus) {
        self.handler.on_result(status);
    }

    /// The shared completion target, as handed to the backend.
    pub fn result_callback(&self) -> Arc<dyn ResultCallback> {
        self.handler.clone()
    }

    /// Build the request `register_all` would send right now.
    pub fn registration_request(&self) -> RegistrationRequest {
        let state = self.state.lock();
        RegistrationRequest::from_set(&state.geofences, self.config.initial_trigger)
    }

    /// Copy of the current set.
    pub fn geofences(&self) -> GeofenceSet {
        self.state.lock().geofences.clone()
    }

    /// Number of geofences in the current set.
    pub fn len(&self) -> usize {
        self.state.lock().geofences.len()
    }

    /// Whether the current set is empty, which disables registration.
    pub fn is_empty(&self) -> bool {
        self.state.lock().geofences.is_empty()
    }

    /// The cached callback token, if one has been created yet.
    pub fn callback_token(&self) -> Option<CallbackToken> {
        self.state.lock().callback_token.clone()
    }

    /// Point-in-time copy of the registration counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn connected_session(&self) -> Result<Arc<dyn BackendSession>, SkipReason> {
        let session = self.session.as_ref().ok_or(SkipReason::NoSession)?;
        if !session.is_connected() {
            return Err(SkipReason::Disconnected);
        }
        Ok(Arc::clone(session))
    }

    fn token_or_create(&self, state: &mut ManagerState) -> CallbackToken {
        state
            .callback_token
            .get_or_insert_with(|| {
                let token = self.targets.create_target();
                tracing::debug!(?token, "Created geofence callback token");
                token
            })
            .clone()
    }

    fn skip(&self, operation: &'static str, reason: SkipReason) -> DispatchOutcome {
        self.stats.skipped();
        tracing::debug!(operation, ?reason, "Skipping geofence call");
        DispatchOutcome::Skipped(reason)
    }

    fn reject(&self, e: BackendError) -> DispatchOutcome {
        match e {
            BackendError::PermissionDenied(_) => self.stats.permission_fault(),
            BackendError::Unavailable(_) => self.stats.rejected(),
        }
        let error = GeofenceError::from(e);
        self.handler.reporter.report(&error);
        DispatchOutcome::Rejected(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemorySession;
    use crate::backend::{
        pending_result, BroadcastTargetFactory, PendingResult, ResultSender, StatusCode,
    };
    use crate::geofence::{InitialTrigger, TransitionMask};
    use std::collections::HashSet;

    /// Backend double that records calls and keeps the senders so tests
    /// decide when, and in which order, calls complete.
    #[derive(Default)]
    struct RecordingApi {
        adds: Mutex<Vec<(RegistrationRequest, CallbackToken)>>,
        removes: Mutex<Vec<CallbackToken>>,
        senders: Mutex<Vec<ResultSender>>,
        fault: Mutex<Option<BackendError>>,
    }

    impl RecordingApi {
        fn fail_with(&self, e: BackendError) {
            *self.fault.lock() = Some(e);
        }

        fn pending(&self) -> Result<PendingResult, BackendError> {
            if let Some(e) = self.fault.lock().clone() {
                return Err(e);
            }
            let (sender, pending) = pending_result();
            self.senders.lock().push(sender);
            Ok(pending)
        }

        fn complete(&self, index: usize, status: RegistrationStatus) {
            let sender = self.senders.lock().remove(index);
            sender.complete(status);
        }

        fn call_count(&self) -> usize {
            self.adds.lock().len() + self.removes.lock().len()
        }
    }

    impl GeofencingApi for RecordingApi {
        fn add_regions(
            &self,
            _session: &dyn BackendSession,
            request: RegistrationRequest,
            target: &CallbackToken,
        ) -> Result<PendingResult, BackendError> {
            let pending = self.pending()?;
            self.adds.lock().push((request, target.clone()));
            Ok(pending)
        }

        fn remove_regions(
            &self,
            _session: &dyn BackendSession,
            target: &CallbackToken,
        ) -> Result<PendingResult, BackendError> {
            let pending = self.pending()?;
            self.removes.lock().push(target.clone());
            Ok(pending)
        }
    }

    #[derive(Default)]
    struct RecordingReporter(Mutex<Vec<GeofenceError>>);

    impl ErrorReporter for RecordingReporter {
        fn report(&self, error: &GeofenceError) {
            self.0.lock().push(error.clone());
        }
    }

    struct Fixture {
        api: Arc<RecordingApi>,
        session: Arc<InMemorySession>,
        targets: Arc<BroadcastTargetFactory>,
        reporter: Arc<RecordingReporter>,
        manager: GeofenceSetManager,
    }

    fn fixture(connected: bool) -> Fixture {
        let api = Arc::new(RecordingApi::default());
        let session = Arc::new(InMemorySession::new(connected));
        let targets = Arc::new(BroadcastTargetFactory::default());
        let reporter = Arc::new(RecordingReporter::default());
        let manager = GeofenceSetManager::new(
            api.clone(),
            Some(session.clone() as Arc<dyn BackendSession>),
            targets.clone(),
        )
        .with_reporter(reporter.clone());
        Fixture {
            api,
            session,
            targets,
            reporter,
            manager,
        }
    }

    fn places_ab() -> Vec<PlaceRecord> {
        vec![
            PlaceRecord::new("A", 1.0, 1.0),
            PlaceRecord::new("B", 2.0, 2.0),
        ]
    }

    #[test]
    fn test_rebuild_set_creates_one_definition_per_place() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());

        assert_eq!(f.manager.len(), 2);
        let ids: HashSet<String> = f.manager.geofences().ids().map(String::from).collect();
        assert_eq!(ids, HashSet::from(["A".to_string(), "B".to_string()]));
        assert_eq!(f.api.call_count(), 0);
    }

    #[test]
    fn test_rebuild_set_replaces_previous_set() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.manager.rebuild_set(&[PlaceRecord::new("C", 3.0, 3.0)]);

        let set = f.manager.geofences();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_rebuild_with_empty_input_clears_set() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.manager.rebuild_set(&[]);

        assert!(f.manager.is_empty());
    }

    #[test]
    fn test_register_all_sends_every_definition() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());

        let outcome = f.manager.register_all();
        assert_eq!(outcome, DispatchOutcome::Dispatched);

        let adds = f.api.adds.lock();
        assert_eq!(adds.len(), 1);
        let (request, _) = &adds[0];
        assert_eq!(request.initial_trigger(), InitialTrigger::Enter);
        assert_eq!(request.len(), 2);
        for def in request.geofences() {
            assert_eq!(def.radius_meters(), 50.0);
            assert_eq!(def.transitions(), TransitionMask::ENTER_EXIT);
        }
        let ids: HashSet<&str> = request.geofences().iter().map(|d| d.id()).collect();
        assert_eq!(ids, HashSet::from(["A", "B"]));
    }

    #[test]
    fn test_register_all_with_empty_set_is_skipped() {
        let f = fixture(true);
        f.manager.rebuild_set(&[]);

        let outcome = f.manager.register_all();
        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::EmptySet));
        assert_eq!(f.api.call_count(), 0);
        assert!(f.reporter.0.lock().is_empty());
    }

    #[test]
    fn test_disconnected_session_skips_both_calls() {
        let f = fixture(false);
        f.manager.rebuild_set(&places_ab());

        assert_eq!(
            f.manager.register_all(),
            DispatchOutcome::Skipped(SkipReason::Disconnected)
        );
        assert_eq!(
            f.manager.unregister_all(),
            DispatchOutcome::Skipped(SkipReason::Disconnected)
        );
        assert_eq!(f.api.call_count(), 0);
        assert_eq!(f.manager.stats().skipped, 2);
        assert!(f.manager.callback_token().is_none());
    }

    #[test]
    fn test_missing_session_skips() {
        let api = Arc::new(RecordingApi::default());
        let manager = GeofenceSetManager::new(
            api.clone(),
            None,
            Arc::new(BroadcastTargetFactory::default()),
        );
        manager.rebuild_set(&places_ab());

        assert_eq!(
            manager.register_all(),
            DispatchOutcome::Skipped(SkipReason::NoSession)
        );
        assert_eq!(
            manager.unregister_all(),
            DispatchOutcome::Skipped(SkipReason::NoSession)
        );
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_reconnected_session_allows_registration() {
        let f = fixture(false);
        f.manager.rebuild_set(&places_ab());
        f.manager.register_all();

        f.session.connect();
        assert!(f.manager.register_all().is_dispatched());
        assert_eq!(f.api.adds.lock().len(), 1);
    }

    #[test]
    fn test_unregister_with_empty_set_is_dispatched() {
        let f = fixture(true);

        assert!(f.manager.unregister_all().is_dispatched());
        assert_eq!(f.api.removes.lock().len(), 1);
    }

    #[test]
    fn test_callback_token_is_shared_between_calls() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());

        f.manager.register_all();
        f.manager.unregister_all();
        f.manager.register_all();

        let adds = f.api.adds.lock();
        let removes = f.api.removes.lock();
        assert_eq!(adds[0].1, removes[0]);
        assert_eq!(adds[1].1, removes[0]);
        assert_eq!(f.targets.created(), 1);
        assert_eq!(f.manager.callback_token(), Some(removes[0].clone()));
    }

    #[test]
    fn test_permission_fault_on_register_is_reported_once() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.api
            .fail_with(BackendError::PermissionDenied("no location".to_string()));

        let outcome = f.manager.register_all();
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(GeofenceError::PermissionDenied(_))
        ));

        let errors = f.reporter.0.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("no location"));
        assert_eq!(f.manager.stats().permission_faults, 1);
        assert_eq!(f.manager.stats().dispatched(), 0);
    }

    #[test]
    fn test_permission_fault_on_unregister_is_reported_once() {
        let f = fixture(true);
        f.api
            .fail_with(BackendError::PermissionDenied("no location".to_string()));

        f.manager.unregister_all();

        assert_eq!(f.reporter.0.lock().len(), 1);
        // The set survives a rejected call untouched.
        assert!(f.manager.is_empty());
    }

    #[test]
    fn test_unavailable_backend_is_reported() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.api.fail_with(BackendError::Unavailable("busy".to_string()));

        f.manager.register_all();

        let errors = f.reporter.0.lock();
        assert!(matches!(errors[0], GeofenceError::CallRejected(_)));
        assert_eq!(f.manager.stats().rejected, 1);
    }

    #[test]
    fn test_failed_completion_is_reported_with_description() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.manager.register_all();

        f.api.complete(
            0,
            RegistrationStatus::from_code(StatusCode::GeofenceNotAvailable),
        );

        let errors = f.reporter.0.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("GEOFENCE_NOT_AVAILABLE"));
        // Local state is not rolled back.
        assert_eq!(f.manager.len(), 2);
    }

    #[test]
    fn test_successful_completion_reports_nothing() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.manager.register_all();

        f.api.complete(0, RegistrationStatus::success());

        assert!(f.reporter.0.lock().is_empty());
        assert_eq!(f.manager.stats().completed_ok, 1);
        assert_eq!(f.manager.stats().in_flight(), 0);
    }

    #[test]
    fn test_completions_may_arrive_out_of_order() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        f.manager.register_all();
        f.manager.unregister_all();
        assert_eq!(f.manager.stats().in_flight(), 2);

        // Unregister completes first.
        f.api.complete(1, RegistrationStatus::success());
        f.api.complete(
            0,
            RegistrationStatus::failure(StatusCode::Timeout, "slow"),
        );

        let stats = f.manager.stats();
        assert_eq!(stats.completed_ok, 1);
        assert_eq!(stats.completed_failed, 1);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(f.reporter.0.lock().len(), 1);
    }

    #[test]
    fn test_on_registration_result_direct() {
        let f = fixture(true);

        f.manager.on_registration_result(RegistrationStatus::success());
        assert!(f.reporter.0.lock().is_empty());

        f.manager
            .on_registration_result(RegistrationStatus::failure(StatusCode::Error, "boom"));
        let errors = f.reporter.0.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("boom"));
    }

    #[test]
    fn test_registration_request_reflects_latest_set() {
        let f = fixture(true);
        f.manager.rebuild_set(&places_ab());
        assert_eq!(f.manager.registration_request().len(), 2);

        f.manager.rebuild_set(&[PlaceRecord::new("Z", 0.0, 0.0)]);
        let request = f.manager.registration_request();
        assert_eq!(request.len(), 1);
        assert_eq!(request.geofences()[0].id(), "Z");
    }

    #[test]
    fn test_with_config_applies_to_new_definitions() {
        let config = GeofenceConfig::default()
            .with_radius_meters(120.0)
            .with_initial_trigger(InitialTrigger::Dwell);
        let manager = GeofenceSetManager::new(
            Arc::new(RecordingApi::default()),
            None,
            Arc::new(BroadcastTargetFactory::default()),
        )
        .with_config(config)
        .unwrap();

        manager.rebuild_set(&places_ab());
        let request = manager.registration_request();
        assert_eq!(request.initial_trigger(), InitialTrigger::Dwell);
        assert_eq!(request.geofences()[0].radius_meters(), 120.0);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let result = GeofenceSetManager::new(
            Arc::new(RecordingApi::default()),
            None,
            Arc::new(BroadcastTargetFactory::default()),
        )
        .with_config(GeofenceConfig::default().with_transitions(TransitionMask::EMPTY));

        assert!(matches!(result, Err(ConfigError::EmptyTransitions)));
    }
}
