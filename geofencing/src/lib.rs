//! Geofencing - geofence set management for location-aware applications
//!
//! This library keeps a bounded set of circular monitoring regions built from
//! named places and registers them, as a single request, with an external
//! location-monitoring backend.
//!
//! # Architecture
//!
//! ```text
//! places ──► GeofenceSetManager ──► RegistrationRequest ──► GeofencingApi
//!            (GeofenceSet, token)                           (async backend)
//!                    ▲                                            │
//!                    └──── RegistrationResultHandler ◄────────────┘
//!                          (ErrorReporter, RegistrationStats)
//! ```
//!
//! Registration is fire-and-forget: operations return immediately, and the
//! backend's outcome arrives later through a shared completion handler that
//! logs failures. Nothing is retried and nothing propagates to the caller.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geofencing::backend::memory::{InMemoryGeofencingApi, InMemorySession};
//! use geofencing::backend::BroadcastTargetFactory;
//! use geofencing::{GeofenceSetManager, PlaceRecord};
//!
//! let api = Arc::new(InMemoryGeofencingApi::new(tokio::runtime::Handle::current()));
//! let session = Arc::new(InMemorySession::connected());
//! let manager = GeofenceSetManager::new(api, Some(session), Arc::new(BroadcastTargetFactory::default()));
//!
//! manager.rebuild_set(&[PlaceRecord::new("A", 1.0, 1.0)]);
//! manager.register_all();
//! ```

pub mod backend;
pub mod config;
pub mod geofence;
pub mod logging;
pub mod manager;
pub mod report;
pub mod stats;

pub use config::{ConfigError, GeofenceConfig};
pub use geofence::{
    GeofenceDefinition, GeofenceSet, InitialTrigger, PlaceRecord, RegistrationRequest, Transition,
    TransitionMask,
};
pub use manager::{DispatchOutcome, GeofenceSetManager, RegistrationResultHandler, SkipReason};
pub use report::{ErrorReporter, GeofenceError, TracingReporter};
pub use stats::{RegistrationStats, StatsSnapshot};
