use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::ParticipantId;

/// This enum contains all error messages this library can produce.
///
/// None of these are fatal. Every failure here is recovered locally — a
/// missing latency measurement falls back to [`FALLBACK_LATENCY`], an
/// unresolvable participant turns the operation into a no-op, and a failed
/// delivery to one recipient never aborts delivery to the rest. The core
/// degrades to inaction (a participant stays visible or stays hidden) rather
/// than propagating failures into the game session.
///
/// [`FALLBACK_LATENCY`]: crate::FALLBACK_LATENCY
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VeilError {
    /// The latency probe could not produce a measurement for a participant.
    LatencyUnavailable {
        /// The participant whose latency was requested.
        participant: ParticipantId,
    },
    /// An identity could not be resolved against the live connection table,
    /// e.g. a deferred callback firing after its target disconnected.
    UnknownParticipant {
        /// The identity that failed to resolve.
        identity: ParticipantId,
    },
    /// Delivery of a message to a single recipient failed.
    Transmission {
        /// The recipient whose delivery failed.
        recipient: ParticipantId,
        /// A description of the underlying transport failure.
        context: String,
    },
}

impl Display for VeilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VeilError::LatencyUnavailable { participant } => {
                write!(f, "No latency measurement available for {}", participant)
            }
            VeilError::UnknownParticipant { identity } => {
                write!(f, "Participant {} is not currently connected", identity)
            }
            VeilError::Transmission { recipient, context } => {
                write!(f, "Failed to transmit to {}: {}", recipient, context)
            }
        }
    }
}

impl Error for VeilError {}
