use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::{GameMode, Latency, Participant, ParticipantId};

/// What a roster message does to the recipient's tab list.
///
/// This shape is dictated by the underlying game protocol; it is an external
/// contract, not something this crate designed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RosterAction {
    /// Insert (or refresh) the listed entries in the recipient's roster.
    Add,
    /// Remove the listed entries from the recipient's roster.
    Remove,
}

/// One participant's data within a roster message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// The participant this entry describes.
    pub id: ParticipantId,
    /// Displayed latency in milliseconds.
    pub latency: Latency,
    /// The participant's game-mode.
    pub game_mode: GameMode,
    /// Display label; an empty label renders as a blank roster row.
    pub label: String,
}

impl RosterEntry {
    /// Builds an entry from a live participant view, overriding the latency.
    ///
    /// The broadcaster uses this with a freshly probed latency value; the
    /// remaining fields are read straight from the session layer.
    #[must_use]
    pub fn from_participant(participant: &Participant, latency: Latency) -> Self {
        RosterEntry {
            id: participant.id.clone(),
            latency,
            game_mode: participant.game_mode,
            label: participant.label.clone(),
        }
    }
}

/// One outbound roster message: an action and a list of entries.
///
/// Messages built by this crate always carry exactly one entry. Intercepted
/// messages are assumed single-entry as well (the server emits one ADD per
/// spawning participant); only the first entry is ever inspected or
/// rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMessage {
    /// Whether this message adds or removes entries.
    pub action: RosterAction,
    /// The entries affected. Inline storage for the ubiquitous 1-entry case.
    pub entries: SmallVec<[RosterEntry; 1]>,
}

impl RosterMessage {
    /// Builds a single-entry message.
    #[must_use]
    pub fn single(action: RosterAction, entry: RosterEntry) -> Self {
        RosterMessage {
            action,
            entries: smallvec![entry],
        }
    }

    /// Returns the first entry, if any.
    #[inline]
    #[must_use]
    pub fn first_entry(&self) -> Option<&RosterEntry> {
        self.entries.first()
    }

    /// Returns the first entry mutably, if any.
    #[inline]
    pub fn first_entry_mut(&mut self) -> Option<&mut RosterEntry> {
        self.entries.first_mut()
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

    fn alice() -> Participant {
        Participant::new("alice", GameMode::Standard, 37, "Alice")
    }

    #[test]
    fn test_entry_from_participant_overrides_latency() {
        let entry = RosterEntry::from_participant(&alice(), 120);
        assert_eq!(entry.id, ParticipantId::from("alice"));
        assert_eq!(entry.latency, 120);
        assert_eq!(entry.game_mode, GameMode::Standard);
        assert_eq!(entry.label, "Alice");
    }

    #[test]
    fn test_single_message_has_one_entry() {
        let msg = RosterMessage::single(
            RosterAction::Remove,
            RosterEntry::from_participant(&alice(), 0),
        );
        assert_eq!(msg.action, RosterAction::Remove);
        assert_eq!(msg.entries.len(), 1);
        assert_eq!(msg.first_entry().unwrap().id.as_str(), "alice");
    }

    #[test]
    fn test_first_entry_mut_rewrites_in_place() {
        let mut msg = RosterMessage::single(
            RosterAction::Add,
            RosterEntry::from_participant(&alice(), 37),
        );
        msg.first_entry_mut().unwrap().label.clear();
        assert_eq!(msg.first_entry().unwrap().label, "");
        assert_eq!(msg.action, RosterAction::Add);
    }

    #[test]
    fn test_empty_message_has_no_first_entry() {
        let mut msg = RosterMessage {
            action: RosterAction::Add,
            entries: SmallVec::new(),
        };
        assert!(msg.first_entry().is_none());
        assert!(msg.first_entry_mut().is_none());
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let msg = RosterMessage::single(
            RosterAction::Add,
            RosterEntry::from_participant(&alice(), 37),
        );
        let bytes = crate::codec::encode(&msg).expect("encoding should succeed");
        let decoded: RosterMessage =
            crate::codec::decode_value(&bytes).expect("decoding should succeed");
        assert_eq!(msg, decoded);
    }
}
