//! Geofence data model.
//!
//! Places come in from the place lookup as [`PlaceRecord`]s, are turned into
//! immutable [`GeofenceDefinition`]s collected in a [`GeofenceSet`], and the
//! set is batched into one [`RegistrationRequest`] per registration.

mod definition;
mod place;
mod transition;

pub use definition::{GeofenceDefinition, GeofenceSet, RegistrationRequest};
pub use place::{PlaceError, PlaceRecord, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
pub use transition::{InitialTrigger, Transition, TransitionMask};
