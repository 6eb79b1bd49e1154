//! Construction and delivery of synthetic roster messages.
//!
//! Everything the registry and interceptor send — suppression REMOVEs,
//! restoration ADDs, single-recipient corrections — is built here from live
//! session data and pushed through the injected [`Transport`], one recipient
//! at a time.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::{
    LatencyProbe, Participant, ParticipantId, RosterAction, RosterEntry, RosterMessage,
    SessionTable, Transport, FALLBACK_LATENCY,
};

/// Builds single-entry roster messages from live participant data and
/// delivers them with per-recipient failure isolation.
///
/// Every send path resolves its target against the [`SessionTable`] first;
/// a target that is no longer connected turns the whole call into a silent
/// no-op. That property is what makes deferred suppression callbacks safe to
/// run without cancellation.
pub struct RosterBroadcaster {
    sessions: Arc<dyn SessionTable>,
    transport: Arc<dyn Transport>,
    probe: Arc<dyn LatencyProbe>,
}

impl RosterBroadcaster {
    /// Creates a broadcaster over the given collaborators.
    pub fn new(
        sessions: Arc<dyn SessionTable>,
        transport: Arc<dyn Transport>,
        probe: Arc<dyn LatencyProbe>,
    ) -> Self {
        RosterBroadcaster {
            sessions,
            transport,
            probe,
        }
    }

    /// Sends an ADD with full live data for `id` to every connected client.
    ///
    /// Used by `show`: visibility is restored for everyone, unconditionally.
    pub fn announce(&self, id: &ParticipantId) {
        let Some(target) = self.resolve(id) else {
            return;
        };
        let recipients: Vec<ParticipantId> =
            self.sessions.connected().into_iter().map(|p| p.id).collect();
        self.deliver(RosterAction::Add, &target, &recipients);
    }

    /// Sends a REMOVE for `id` to every connected client, except `id` itself
    /// while it is in spectator mode.
    ///
    /// A spectator must keep seeing its own roster entry for its
    /// self-targeting tooling to keep working.
    pub fn suppress(&self, id: &ParticipantId) {
        let Some(target) = self.resolve(id) else {
            return;
        };
        let recipients = self.suppression_recipients(&target);
        self.deliver(RosterAction::Remove, &target, &recipients);
    }

    /// Sends one corrective message addressed only to `id` itself: an ADD if
    /// `id` is currently a spectator (restoring self-visibility), a REMOVE
    /// otherwise (re-hiding after leaving spectator mode).
    ///
    /// No other client receives anything; this reconciles a game-mode change
    /// with the hidden state without a re-broadcast.
    pub fn correct(&self, id: &ParticipantId) {
        let Some(target) = self.resolve(id) else {
            return;
        };
        let action = if target.game_mode.is_spectator() {
            RosterAction::Add
        } else {
            RosterAction::Remove
        };
        let recipients = [target.id.clone()];
        self.deliver(action, &target, &recipients);
    }

    /// The recipient set for suppressing `target`: everyone connected, minus
    /// `target` itself when it is spectating.
    pub(crate) fn suppression_recipients(&self, target: &Participant) -> Vec<ParticipantId> {
        let exclude_self = target.game_mode.is_spectator();
        self.sessions
            .connected()
            .into_iter()
            .map(|p| p.id)
            .filter(|id| !(exclude_self && id == &target.id))
            .collect()
    }

    fn resolve(&self, id: &ParticipantId) -> Option<Participant> {
        let resolved = self.sessions.resolve(id);
        if resolved.is_none() {
            trace!("Broadcast target {} not connected; nothing to send", id);
        }
        resolved
    }

    fn entry_for(&self, target: &Participant) -> RosterEntry {
        let latency = match self.probe.latency_of(&target.id) {
            Ok(latency) => latency,
            Err(err) => {
                warn!("Latency probe failed ({}); using fallback", err);
                FALLBACK_LATENCY
            }
        };
        RosterEntry::from_participant(target, latency)
    }

    fn deliver(&self, action: RosterAction, target: &Participant, recipients: &[ParticipantId]) {
        let message = RosterMessage::single(action, self.entry_for(target));
        trace!(
            "Delivering {:?} for {} to {} recipient(s)",
            action,
            target.id,
            recipients.len()
        );
        for recipient in recipients {
            if let Err(err) = self.transport.transmit(&message, recipient) {
                warn!("Dropping delivery to one recipient: {}", err);
            }
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
    use crate::{GameMode, Latency, VeilError};
    use parking_lot::Mutex;

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

    struct FixedProbe {
        latency: Option<Latency>,
    }

    impl LatencyProbe for FixedProbe {
        fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError> {
            self.latency.ok_or_else(|| VeilError::LatencyUnavailable {
                participant: id.clone(),
            })
        }
    }

    struct Recording {
        sent: Mutex<Vec<(RosterMessage, ParticipantId)>>,
        fail_for: Option<ParticipantId>,
    }

    impl Transport for Recording {
        fn transmit(
            &self,
            message: &RosterMessage,
            recipient: &ParticipantId,
        ) -> Result<(), VeilError> {
            if self.fail_for.as_ref() == Some(recipient) {
                return Err(VeilError::Transmission {
                    recipient: recipient.clone(),
                    context: "stub failure".to_owned(),
                });
            }
            self.sent.lock().push((message.clone(), recipient.clone()));
            Ok(())
        }
    }

    fn three_clients(alice_mode: GameMode) -> Vec<Participant> {
        vec![
            Participant::new("alice", alice_mode, 30, "Alice"),
            Participant::new("bob", GameMode::Standard, 40, "Bob"),
            Participant::new("carol", GameMode::Standard, 50, "Carol"),
        ]
    }

    fn broadcaster(
        participants: Vec<Participant>,
        latency: Option<Latency>,
        fail_for: Option<ParticipantId>,
    ) -> (RosterBroadcaster, Arc<Recording>) {
        let transport = Arc::new(Recording {
            sent: Mutex::new(Vec::new()),
            fail_for,
        });
        let broadcaster = RosterBroadcaster::new(
            Arc::new(FixedSessions { participants }),
            transport.clone(),
            Arc::new(FixedProbe { latency }),
        );
        (broadcaster, transport)
    }

    #[test]
    fn test_announce_reaches_everyone() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Spectator), Some(77), None);
        broadcaster.announce(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 3);
        for (message, _) in sent.iter() {
            assert_eq!(message.action, RosterAction::Add);
            let entry = message.first_entry().unwrap();
            assert_eq!(entry.id.as_str(), "alice");
            assert_eq!(entry.latency, 77);
            assert_eq!(entry.label, "Alice");
        }
    }

    #[test]
    fn test_suppress_excludes_spectating_target() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Spectator), Some(1), None);
        broadcaster.suppress(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        let recipients: Vec<&str> = sent.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(recipients, vec!["bob", "carol"]);
        assert!(sent.iter().all(|(m, _)| m.action == RosterAction::Remove));
    }

    #[test]
    fn test_suppress_includes_standard_target() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Standard), Some(1), None);
        broadcaster.suppress(&ParticipantId::from("alice"));
        assert_eq!(transport.sent.lock().len(), 3);
    }

    #[test]
    fn test_correct_spectator_gets_self_add() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Spectator), Some(5), None);
        broadcaster.correct(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.action, RosterAction::Add);
        assert_eq!(sent[0].1.as_str(), "alice");
    }

    #[test]
    fn test_correct_standard_gets_self_remove() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Standard), Some(5), None);
        broadcaster.correct(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.action, RosterAction::Remove);
        assert_eq!(sent[0].1.as_str(), "alice");
    }

    #[test]
    fn test_disconnected_target_is_silent_noop() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Standard), Some(5), None);
        broadcaster.suppress(&ParticipantId::from("ghost"));
        broadcaster.announce(&ParticipantId::from("ghost"));
        broadcaster.correct(&ParticipantId::from("ghost"));
        assert!(transport.sent.lock().is_empty());
    }

    #[test]
    fn test_probe_failure_falls_back_to_zero() {
        let (broadcaster, transport) = broadcaster(three_clients(GameMode::Standard), None, None);
        broadcaster.announce(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        assert_eq!(sent[0].0.first_entry().unwrap().latency, FALLBACK_LATENCY);
    }

    #[test]
    fn test_one_failed_recipient_does_not_abort_delivery() {
        let (broadcaster, transport) = broadcaster(
            three_clients(GameMode::Standard),
            Some(9),
            Some(ParticipantId::from("bob")),
        );
        broadcaster.announce(&ParticipantId::from("alice"));

        let sent = transport.sent.lock();
        let recipients: Vec<&str> = sent.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(recipients, vec!["alice", "carol"]);
    }
}
