//! Collaborator traits at the boundary between this crate and the game
//! server it is embedded in.
//!
//! The core owns no sockets, timers, or session state. Everything it needs
//! from the outside world comes through these seams, which the surrounding
//! glue layer implements against the real server and tests implement with
//! stubs. All of them must be cheap, non-blocking calls.

use std::sync::Arc;

use crate::{Latency, Participant, ParticipantId, RosterMessage, Ticks, VeilError};

/// The live connection table of the game server.
pub trait SessionTable: Send + Sync {
    /// Resolves an identity against the currently connected participants.
    ///
    /// Returns `None` for identities that are not connected right now, which
    /// includes placeholder/preview roster entries the server fabricates.
    fn resolve(&self, id: &ParticipantId) -> Option<Participant>;

    /// Returns a snapshot of every currently connected participant.
    fn connected(&self) -> Vec<Participant>;
}

/// Delivery of one roster message to one connection.
pub trait Transport: Send + Sync {
    /// Transmits `message` to `recipient`.
    ///
    /// A failure here is isolated to this recipient; the broadcaster logs it
    /// and continues with the remaining recipients. Implementations should
    /// treat an unreachable or disconnected recipient as a failure, not a
    /// panic.
    fn transmit(&self, message: &RosterMessage, recipient: &ParticipantId)
        -> Result<(), VeilError>;
}

/// The server's tick-loop scheduler, used for one-shot deferred callbacks.
///
/// There is no cancellation: submitted callbacks always run after the delay
/// elapses, so they are written to be safe no-ops when their target has
/// disconnected or been shown again in the meantime.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once, `delay` ticks from now.
    fn after(&self, delay: Ticks, task: Box<dyn FnOnce() + Send>);
}

/// Source of current latency measurements.
pub trait LatencyProbe: Send + Sync {
    /// Returns the participant's current measured latency.
    ///
    /// Callers fall back to [`FALLBACK_LATENCY`](crate::FALLBACK_LATENCY) on
    /// failure; the error is logged, never propagated.
    fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError>;
}

/// A hook invoked for every outbound roster message before it reaches the
/// network.
///
/// Implemented by [`RosterInterceptor`](crate::RosterInterceptor) and
/// consumed by whatever [`PacketStream`] the glue layer provides. The hook
/// runs synchronously in the server's network I/O context and may mutate the
/// message in place; the (possibly mutated) message is then transmitted.
pub trait OutboundHook: Send + Sync {
    /// Inspects and optionally rewrites one outbound roster message bound
    /// for `recipient`.
    fn on_outbound(&self, recipient: &ParticipantId, message: &mut RosterMessage);
}

/// The server's outbound roster message stream, supporting hook
/// registration and teardown.
pub trait PacketStream: Send + Sync {
    /// Subscribes `hook` to every outbound roster message.
    fn attach(&self, hook: Arc<dyn OutboundHook>) -> HookId;

    /// Removes a previously attached hook. Detaching an already detached
    /// hook is a no-op.
    fn detach(&self, hook: HookId);
}

/// Opaque handle identifying an attached [`OutboundHook`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    /// Creates a hook id from a raw value chosen by the [`PacketStream`].
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        HookId(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}
