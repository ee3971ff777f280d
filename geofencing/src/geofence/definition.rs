//! Geofence definitions, the managed set, and the registration request.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::GeofenceConfig;

use super::place::{PlaceError, PlaceRecord};
use super::transition::{InitialTrigger, TransitionMask};

/// One circular monitored region.
///
/// Definitions are immutable once built; the manager replaces the whole set
/// instead of editing individual regions.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceDefinition {
    id: String,
    latitude: f64,
    longitude: f64,
    radius_meters: f32,
    expiration: Duration,
    transitions: TransitionMask,
}

impl GeofenceDefinition {
    /// Build a definition for `place` using the radius, expiration and
    /// transitions from `config`.
    pub fn from_place(place: &PlaceRecord, config: &GeofenceConfig) -> Result<Self, PlaceError> {
        place.validate()?;
        Ok(Self {
            id: place.id.clone(),
            latitude: place.lat,
            longitude: place.lon,
            radius_meters: config.radius_meters,
            expiration: config.expiration,
            transitions: config.transitions,
        })
    }

    /// Request id, taken from the originating place.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Center as `(latitude, longitude)` in degrees.
    pub fn center(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn radius_meters(&self) -> f32 {
        self.radius_meters
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Expiration in milliseconds, as the backend expects it.
    pub fn expiration_millis(&self) -> u64 {
        u64::try_from(self.expiration.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn transitions(&self) -> TransitionMask {
        self.transitions
    }
}

/// The ordered collection of geofences currently managed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceSet {
    definitions: Vec<GeofenceDefinition>,
}

impl GeofenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from places.
    ///
    /// Places that cannot become geofences (empty id, coordinates out of
    /// range) are skipped. A repeated id replaces the earlier definition at
    /// its original position, matching the backend's replace-by-id rule, so
    /// ids are unique within the returned set.
    pub fn from_places(places: &[PlaceRecord], config: &GeofenceConfig) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(places.len());
        let mut definitions: Vec<GeofenceDefinition> = Vec::with_capacity(places.len());

        for place in places {
            let definition = match GeofenceDefinition::from_place(place, config) {
                Ok(definition) => definition,
                Err(e) => {
                    tracing::warn!(place_id = %place.id, error = %e, "Skipping invalid place");
                    continue;
                }
            };
            match index.get(place.id.as_str()) {
                Some(&slot) => {
                    tracing::warn!(place_id = %place.id, "Duplicate place id replaces earlier entry");
                    definitions[slot] = definition;
                }
                None => {
                    index.insert(place.id.as_str(), definitions.len());
                    definitions.push(definition);
                }
            }
        }

        Self { definitions }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[GeofenceDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&GeofenceDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.id.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeofenceDefinition> {
        self.definitions.iter()
    }
}

impl<'a> IntoIterator for &'a GeofenceSet {
    type Item = &'a GeofenceDefinition;
    type IntoIter = std::slice::Iter<'a, GeofenceDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}

/// A single combined request to start monitoring every geofence in a set.
///
/// Built on demand right before each registration so it always reflects the
/// latest set; never stored by the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    initial_trigger: InitialTrigger,
    geofences: Vec<GeofenceDefinition>,
}

impl RegistrationRequest {
    /// Build a request covering every definition in `set`.
    pub fn from_set(set: &GeofenceSet, initial_trigger: InitialTrigger) -> Self {
        Self {
            initial_trigger,
            geofences: set.definitions.clone(),
        }
    }

    pub fn initial_trigger(&self) -> InitialTrigger {
        self.initial_trigger
    }

    pub fn geofences(&self) -> &[GeofenceDefinition] {
        &self.geofences
    }

    pub fn len(&self) -> usize {
        self.geofences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geofences.is_empty()
    }

    /// Hand the definitions over to the backend.
    pub fn into_geofences(self) -> Vec<GeofenceDefinition> {
        self.geofences
    }
}
