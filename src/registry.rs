//! The process-wide visibility state and its operations.
//!
//! Two semantic sets of participant identifiers live behind a single mutex:
//! `hidden` (participants suppressed from everyone else's roster) and
//! `exempt` (participants currently undergoing a self-visibility
//! correction). The raw sets are never exposed; every access goes through
//! the operations on [`VisibilityRegistry`].

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{ParticipantId, RosterBroadcaster};

/// The two identifier sets, guarded together by one lock.
///
/// Shared between the registry, the interceptor, and deferred suppression
/// callbacks; all three contexts take the same mutex, so every read is a
/// consistent snapshot.
#[derive(Default)]
pub(crate) struct VisibilitySets {
    /// Participants suppressed from other clients' rosters. Entries persist
    /// until explicitly shown; disconnection does not clear them, so a
    /// reconnect under the same identity stays hidden.
    pub(crate) hidden: HashSet<ParticipantId>,
    /// Participants mid-`fix`. Membership is transient, spanning a single
    /// corrective send.
    pub(crate) exempt: HashSet<ParticipantId>,
}

/// Hide/show/query/fix operations over the visibility state.
///
/// Presence in the hidden set is the single source of truth for "suppressed
/// from others' rosters". The registry mutates it and triggers the matching
/// broadcasts; the [interceptor](crate::RosterInterceptor) only ever reads
/// it.
pub struct VisibilityRegistry {
    sets: Arc<Mutex<VisibilitySets>>,
    broadcaster: Arc<RosterBroadcaster>,
}

impl VisibilityRegistry {
    /// Creates a registry with empty state over the given broadcaster.
    pub fn new(broadcaster: Arc<RosterBroadcaster>) -> Self {
        VisibilityRegistry {
            sets: Arc::new(Mutex::new(VisibilitySets::default())),
            broadcaster,
        }
    }

    /// Handle to the shared sets, for the interceptor and its deferred
    /// callbacks.
    pub(crate) fn shared_sets(&self) -> Arc<Mutex<VisibilitySets>> {
        Arc::clone(&self.sets)
    }

    /// Hides a participant from every other client's roster.
    ///
    /// Returns `true` iff the participant was not already hidden. The
    /// suppression REMOVE is broadcast unconditionally either way; the
    /// boolean only tells callers whether this was a no-op for user-facing
    /// messaging. Recipients are all connected clients, excluding the target
    /// itself while it is in spectator mode.
    pub fn hide(&self, id: &ParticipantId) -> bool {
        let changed = self.sets.lock().hidden.insert(id.clone());
        debug!("Hiding {} (state changed: {})", id, changed);
        self.broadcaster.suppress(id);
        changed
    }

    /// Makes a participant visible again in every client's roster.
    ///
    /// Returns `true` iff the participant was hidden before the call. An ADD
    /// with full live data is broadcast to all connected clients
    /// unconditionally.
    pub fn show(&self, id: &ParticipantId) -> bool {
        let changed = self.sets.lock().hidden.remove(id);
        debug!("Showing {} (state changed: {})", id, changed);
        self.broadcaster.announce(id);
        changed
    }

    /// Returns `true` iff the participant is not currently hidden.
    #[must_use]
    pub fn is_visible(&self, id: &ParticipantId) -> bool {
        !self.sets.lock().hidden.contains(id)
    }

    /// Reconciles a hidden participant's own roster view after a game-mode
    /// change.
    ///
    /// No-op when the participant is visible. Otherwise the participant is
    /// marked exempt (so the interceptor passes the corrective message
    /// through untouched), exactly one message addressed only to the
    /// participant itself is sent — an ADD when it is spectating, a REMOVE
    /// otherwise — and the exemption is lifted. No other client receives
    /// anything, and hidden membership is unchanged.
    pub fn fix(&self, id: &ParticipantId) {
        {
            let mut sets = self.sets.lock();
            if !sets.hidden.contains(id) {
                return;
            }
            sets.exempt.insert(id.clone());
        }
        debug!("Correcting self-visibility for {}", id);
        self.broadcaster.correct(id);
        self.sets.lock().exempt.remove(id);
    }

    /// A consistent snapshot of every hidden participant identifier.
    #[must_use]
    pub fn hidden_players(&self) -> HashSet<ParticipantId> {
        self.sets.lock().hidden.clone()
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
    use crate::{
        GameMode, Latency, LatencyProbe, Participant, RosterAction, RosterMessage, SessionTable,
        Transport, VeilError,
    };

    struct FixedSessions {
        participants: Vec<Participant>,
    }

    impl SessionTable for FixedSessions {
        fn resolve(&self, id: &ParticipantId) -> Option<Participant> {
            self.participants.iter().find(|p| &p.id == id).cloned()
        }

        fn connected(&self) -> Vec<Participant> {
            self.participants.clone()
        }
    }

    struct ProbeFromTable(Arc<FixedSessions>);

    impl LatencyProbe for ProbeFromTable {
        fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError> {
            self.0
                .resolve(id)
                .map(|p| p.latency)
                .ok_or_else(|| VeilError::LatencyUnavailable {
                    participant: id.clone(),
                })
        }
    }

    struct Recording {
        sent: Mutex<Vec<(RosterMessage, ParticipantId)>>,
    }

    impl Transport for Recording {
        fn transmit(
            &self,
            message: &RosterMessage,
            recipient: &ParticipantId,
        ) -> Result<(), VeilError> {
            self.sent.lock().push((message.clone(), recipient.clone()));
            Ok(())
        }
    }

    fn registry_with(
        participants: Vec<Participant>,
    ) -> (VisibilityRegistry, Arc<Recording>) {
        let sessions = Arc::new(FixedSessions { participants });
        let transport = Arc::new(Recording {
            sent: Mutex::new(Vec::new()),
        });
        let probe = Arc::new(ProbeFromTable(sessions.clone()));
        let broadcaster = Arc::new(RosterBroadcaster::new(sessions, transport.clone(), probe));
        (VisibilityRegistry::new(broadcaster), transport)
    }

    fn pair() -> Vec<Participant> {
        vec![
            Participant::new("alice", GameMode::Standard, 10, "Alice"),
            Participant::new("bob", GameMode::Standard, 20, "Bob"),
        ]
    }

    #[test]
    fn test_hide_is_idempotent_with_boolean_signal() {
        let (registry, _) = registry_with(pair());
        let alice = ParticipantId::from("alice");
        assert!(registry.hide(&alice));
        assert!(!registry.hide(&alice));
        assert!(!registry.is_visible(&alice));
    }

    #[test]
    fn test_show_restores_visibility() {
        let (registry, _) = registry_with(pair());
        let alice = ParticipantId::from("alice");
        registry.hide(&alice);
        assert!(registry.show(&alice));
        assert!(registry.is_visible(&alice));
        assert!(!registry.show(&alice));
    }

    #[test]
    fn test_repeated_hide_still_broadcasts() {
        let (registry, transport) = registry_with(pair());
        let alice = ParticipantId::from("alice");
        registry.hide(&alice);
        let after_first = transport.sent.lock().len();
        registry.hide(&alice);
        assert_eq!(transport.sent.lock().len(), after_first * 2);
    }

    #[test]
    fn test_hidden_players_snapshot() {
        let (registry, _) = registry_with(pair());
        let alice = ParticipantId::from("alice");
        registry.hide(&alice);
        let snapshot = registry.hidden_players();
        assert!(snapshot.contains(&alice));

        registry.show(&alice);
        assert!(!registry.hidden_players().contains(&alice));
        // The earlier snapshot is a copy, not a live view.
        assert!(snapshot.contains(&alice));
    }

    #[test]
    fn test_fix_is_noop_for_visible_participant() {
        let (registry, transport) = registry_with(pair());
        registry.fix(&ParticipantId::from("alice"));
        assert!(transport.sent.lock().is_empty());
    }

    #[test]
    fn test_fix_clears_exemption_and_keeps_hidden_membership() {
        let (registry, transport) = registry_with(vec![
            Participant::new("alice", GameMode::Spectator, 10, "Alice"),
            Participant::new("bob", GameMode::Standard, 20, "Bob"),
        ]);
        let alice = ParticipantId::from("alice");
        registry.hide(&alice);
        transport.sent.lock().clear();

        registry.fix(&alice);

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.action, RosterAction::Add);
        assert_eq!(sent[0].1, alice);
        assert!(registry.shared_sets().lock().exempt.is_empty());
        assert!(!registry.is_visible(&alice));
    }

    #[test]
    fn test_hidden_membership_survives_disconnect() {
        let (registry, _) = registry_with(pair());
        let ghost = ParticipantId::from("ghost");
        // Never connected; hide still records the identifier.
        registry.hide(&ghost);
        assert!(!registry.is_visible(&ghost));
        assert!(registry.hidden_players().contains(&ghost));
    }
}
