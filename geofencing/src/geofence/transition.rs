//! Transition types and trigger policies.
//!
//! A geofence fires when the device crosses its boundary. Which crossings are
//! reported is controlled by a [`TransitionMask`], a small bitset over the
//! [`Transition`] kinds understood by the backend.

use std::fmt;
use std::ops::BitOr;

/// A boundary crossing the backend can report.
///
/// Discriminants match the backend's wire values so a mask can be handed over
/// as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Transition {
    /// The device moved from outside to inside the region.
    Enter = 1,
    /// The device moved from inside to outside the region.
    Exit = 2,
    /// The device stayed inside the region for the loitering delay.
    Dwell = 4,
}

impl Transition {
    /// All transition kinds, in bit order.
    pub const ALL: [Transition; 3] = [Transition::Enter, Transition::Exit, Transition::Dwell];

    /// Bit value of this transition.
    #[inline]
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Lowercase name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Enter => "enter",
            Transition::Exit => "exit",
            Transition::Dwell => "dwell",
        }
    }

    /// Parse a transition name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "enter" => Some(Transition::Enter),
            "exit" => Some(Transition::Exit),
            "dwell" => Some(Transition::Dwell),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Set of transitions a geofence reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransitionMask(u8);

impl TransitionMask {
    /// Mask with no transitions. Not accepted by the backend.
    pub const EMPTY: TransitionMask = TransitionMask(0);

    /// Enter and exit, the mask every managed geofence uses by default.
    pub const ENTER_EXIT: TransitionMask =
        TransitionMask(Transition::Enter as u8 | Transition::Exit as u8);

    /// Create a mask from raw bits, dropping unknown bits.
    pub fn from_bits_truncate(bits: u8) -> Self {
        let known = Transition::ALL.iter().fold(0u8, |acc, t| acc | t.bit());
        Self(bits & known)
    }

    /// Raw bit value handed to the backend.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether `transition` is part of this mask.
    #[inline]
    pub fn contains(self, transition: Transition) -> bool {
        self.0 & transition.bit() != 0
    }

    /// Returns a mask with `transition` added.
    #[inline]
    pub fn with(self, transition: Transition) -> Self {
        Self(self.0 | transition.bit())
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the transitions in this mask, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Transition> {
        Transition::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl From<Transition> for TransitionMask {
    fn from(transition: Transition) -> Self {
        Self(transition.bit())
    }
}

impl BitOr for Transition {
    type Output = TransitionMask;

    fn bitor(self, rhs: Transition) -> TransitionMask {
        TransitionMask::from(self).with(rhs)
    }
}

impl BitOr<Transition> for TransitionMask {
    type Output = TransitionMask;

    fn bitor(self, rhs: Transition) -> TransitionMask {
        self.with(rhs)
    }
}

impl BitOr for TransitionMask {
    type Output = TransitionMask;

    fn bitor(self, rhs: TransitionMask) -> TransitionMask {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<Transition> for TransitionMask {
    fn from_iter<I: IntoIterator<Item = Transition>>(iter: I) -> Self {
        iter.into_iter().fold(TransitionMask::EMPTY, |mask, t| mask.with(t))
    }
}

impl fmt::Display for TransitionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.iter().map(Transition::as_str).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Which transition fires immediately when a region is added while the device
/// is already in the matching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InitialTrigger {
    /// Fire ENTER right away if the device is already inside.
    #[default]
    Enter,
    /// Fire EXIT right away if the device is already outside.
    Exit,
    /// Fire DWELL once the device has loitered inside.
    Dwell,
}

impl InitialTrigger {
    /// The transition this trigger corresponds to.
    pub fn transition(self) -> Transition {
        match self {
            InitialTrigger::Enter => Transition::Enter,
            InitialTrigger::Exit => Transition::Exit,
            InitialTrigger::Dwell => Transition::Dwell,
        }
    }

    /// Parse a trigger name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        Transition::parse(name).map(|t| match t {
            Transition::Enter => InitialTrigger::Enter,
            Transition::Exit => InitialTrigger::Exit,
            Transition::Dwell => InitialTrigger::Dwell,
        })
    }
}
