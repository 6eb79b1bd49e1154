//! # Roster Veil
//!
//! Roster Veil intercepts the roster-ADD messages a multiplayer game server
//! sends to its clients and suppresses selected participants from everyone
//! else's visible roster (the "tab list"), without disturbing the game
//! mechanics that need the suppressed participant's entity to exist
//! client-side.
//!
//! Removing a roster row at spawn time prevents the client from ever creating
//! the entity, so suppression is two-phase: the intercepted ADD goes through
//! with a blanked display label (the entity spawns, the row is invisible in
//! practice), and a real REMOVE follows a few server ticks later via the
//! injected [`Scheduler`].
//!
//! The crate does not own any sockets, timers, or session state. All of that
//! is injected through the collaborator traits in [`hooks`]: a
//! [`SessionTable`] for live participant data, a [`Transport`] for delivery,
//! a [`PacketStream`] carrying the outbound roster messages, a [`Scheduler`]
//! for one-shot deferred callbacks, and a [`LatencyProbe`] for displayed
//! latency values.
//!
//! ```no_run
//! use std::sync::Arc;
//! use roster_veil::{ParticipantId, VeilBuilder};
//! # use roster_veil::{HookId, Latency, LatencyProbe, OutboundHook, PacketStream,
//! #     Participant, RosterMessage, Scheduler, SessionTable, Ticks, Transport, VeilError};
//! # struct Glue;
//! # impl SessionTable for Glue {
//! #     fn resolve(&self, _: &ParticipantId) -> Option<Participant> { None }
//! #     fn connected(&self) -> Vec<Participant> { Vec::new() }
//! # }
//! # impl Transport for Glue {
//! #     fn transmit(&self, _: &RosterMessage, _: &ParticipantId) -> Result<(), VeilError> { Ok(()) }
//! # }
//! # impl Scheduler for Glue {
//! #     fn after(&self, _: Ticks, _: Box<dyn FnOnce() + Send>) {}
//! # }
//! # impl LatencyProbe for Glue {
//! #     fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError> {
//! #         Err(VeilError::LatencyUnavailable { participant: id.clone() })
//! #     }
//! # }
//! # impl PacketStream for Glue {
//! #     fn attach(&self, _: Arc<dyn OutboundHook>) -> HookId { HookId::new(0) }
//! #     fn detach(&self, _: HookId) {}
//! # }
//! # let glue = Arc::new(Glue);
//! let veil = VeilBuilder::new(
//!     glue.clone(), // session table
//!     glue.clone(), // transport
//!     glue.clone(), // outbound packet stream
//!     glue.clone(), // tick scheduler
//!     glue,         // latency probe
//! )
//! .build();
//!
//! veil.start();
//! veil.hide(&ParticipantId::from("alice"));
//! assert!(!veil.is_visible(&ParticipantId::from("alice")));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use broadcaster::RosterBroadcaster;
pub use error::VeilError;
pub use hooks::{
    HookId, LatencyProbe, OutboundHook, PacketStream, Scheduler, SessionTable, Transport,
};
pub use interceptor::RosterInterceptor;
pub use registry::VisibilityRegistry;
pub use roster::{RosterAction, RosterEntry, RosterMessage};
pub use veil::{RosterVeil, VeilBuilder};

mod broadcaster;
pub mod codec;
mod error;
pub mod hooks;
mod interceptor;
mod registry;
mod roster;
mod veil;

use serde::{Deserialize, Serialize};

// #############
// # CONSTANTS #
// #############

/// Delay between the rewritten ADD passing through and the deferred REMOVE
/// that completes the suppression.
///
/// Ten ticks is comfortably longer than message delivery latency, so the
/// client has finished spawning the entity by the time the REMOVE lands.
pub const SUPPRESS_DELAY_TICKS: Ticks = Ticks::new(10);

/// Latency value used when the [`LatencyProbe`] cannot produce a measurement.
pub const FALLBACK_LATENCY: Latency = 0;

/// A latency measurement in milliseconds, as displayed in the roster.
pub type Latency = u32;

/// A duration measured in server ticks, the unit for deferred callbacks.
///
/// The tick is the game server's fixed discrete time step. This crate never
/// converts ticks to wall-clock time; the injected [`Scheduler`] owns that
/// mapping.
///
/// # Examples
///
/// ```
/// use roster_veil::Ticks;
///
/// let delay = Ticks::new(10);
/// assert_eq!(delay.as_u64(), 10);
/// assert!(Ticks::new(20) > delay);
/// ```
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Ticks(u64);

impl Ticks {
    /// Creates a `Ticks` from a raw tick count.
    #[inline]
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Ticks(ticks)
    }

    /// Returns the underlying tick count.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ticks", self.0)
    }
}

impl From<u64> for Ticks {
    #[inline]
    fn from(value: u64) -> Self {
        Ticks(value)
    }
}

/// The stable identifier of a connected participant.
///
/// Identifiers are whatever the surrounding session layer uses as a stable
/// key — a login name or a stringified UUID. Presence of an identifier in the
/// hidden set is the single source of truth for "suppressed from others'
/// rosters"; nothing is ever inferred from packet content.
///
/// # Examples
///
/// ```
/// use roster_veil::ParticipantId;
///
/// let id = ParticipantId::from("alice");
/// assert_eq!(id.as_str(), "alice");
/// assert_eq!(id.to_string(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Creates an identifier from anything string-like.
    #[inline]
    pub fn new(identity: impl Into<String>) -> Self {
        ParticipantId(identity.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    #[inline]
    fn from(value: &str) -> Self {
        ParticipantId(value.to_owned())
    }
}

impl From<String> for ParticipantId {
    #[inline]
    fn from(value: String) -> Self {
        ParticipantId(value)
    }
}

/// The game-mode of a participant, as carried in roster entries.
///
/// The only distinction this crate cares about is spectator versus everything
/// else: a spectator must keep seeing its own roster entry for its
/// observation tooling to work, so suppression broadcasts exclude the hidden
/// participant itself while it is spectating.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// Any non-spectator mode.
    #[default]
    Standard,
    /// Observer mode with non-collision movement and self-targeting tooling.
    Spectator,
}

impl GameMode {
    /// Returns `true` for [`GameMode::Spectator`].
    ///
    /// # Examples
    ///
    /// ```
    /// use roster_veil::GameMode;
    ///
    /// assert!(GameMode::Spectator.is_spectator());
    /// assert!(!GameMode::Standard.is_spectator());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_spectator(self) -> bool {
        matches!(self, GameMode::Spectator)
    }
}

/// A read-only view of one connected participant.
///
/// Owned by the external session layer and handed out by
/// [`SessionTable::resolve`] / [`SessionTable::connected`]. The core reads
/// these fields at message-construction time and never persists a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Stable identifier, the key for all visibility bookkeeping.
    pub id: ParticipantId,
    /// Current game-mode.
    pub game_mode: GameMode,
    /// Last measured latency in milliseconds.
    pub latency: Latency,
    /// Display label shown in the roster.
    pub label: String,
}

impl Participant {
    /// Convenience constructor for a participant view.
    pub fn new(
        id: impl Into<ParticipantId>,
        game_mode: GameMode,
        latency: Latency,
        label: impl Into<String>,
    ) -> Self {
        Participant {
            id: id.into(),
            game_mode,
            latency,
            label: label.into(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_ordering_and_display() {
        assert!(Ticks::new(3) < Ticks::new(4));
        assert_eq!(Ticks::new(10).to_string(), "10 ticks");
        assert_eq!(Ticks::from(7).as_u64(), 7);
    }

    #[test]
    fn test_participant_id_roundtrip() {
        let id = ParticipantId::new(String::from("alice"));
        assert_eq!(id, ParticipantId::from("alice"));
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_game_mode_default_is_standard() {
        assert_eq!(GameMode::default(), GameMode::Standard);
        assert!(!GameMode::default().is_spectator());
    }

    #[test]
    fn test_participant_new() {
        let p = Participant::new("bob", GameMode::Spectator, 42, "Bob");
        assert_eq!(p.id.as_str(), "bob");
        assert!(p.game_mode.is_spectator());
        assert_eq!(p.latency, 42);
        assert_eq!(p.label, "Bob");
    }
}
