//! Interception of outbound roster-ADD messages.
//!
//! This is the piece with real protocol sequencing. A hidden participant's
//! ADD cannot simply be dropped or turned into a REMOVE: the recipient's
//! client only creates the participant's entity once it has seen the ADD, so
//! suppressing the roster row at spawn time would desynchronize client-side
//! entity state. Instead the ADD passes through with a blanked label, and the
//! real REMOVE follows a fixed number of ticks later, once the spawn has
//! completed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::registry::VisibilitySets;
use crate::{
    OutboundHook, ParticipantId, RosterAction, RosterBroadcaster, RosterMessage, Scheduler,
    SessionTable, Ticks,
};

/// The outbound-hook state machine deciding, per intercepted ADD and
/// recipient, whether to pass through, rewrite in place, or rewrite and
/// schedule a deferred suppression.
///
/// Runs synchronously in the server's network I/O context. It only ever
/// reads the hidden set; all mutation goes through the
/// [`VisibilityRegistry`](crate::VisibilityRegistry).
pub struct RosterInterceptor {
    sets: Arc<Mutex<VisibilitySets>>,
    sessions: Arc<dyn SessionTable>,
    broadcaster: Arc<RosterBroadcaster>,
    scheduler: Arc<dyn Scheduler>,
    suppress_delay: Ticks,
}

impl RosterInterceptor {
    pub(crate) fn new(
        sets: Arc<Mutex<VisibilitySets>>,
        sessions: Arc<dyn SessionTable>,
        broadcaster: Arc<RosterBroadcaster>,
        scheduler: Arc<dyn Scheduler>,
        suppress_delay: Ticks,
    ) -> Self {
        RosterInterceptor {
            sets,
            sessions,
            broadcaster,
            scheduler,
            suppress_delay,
        }
    }

    fn schedule_suppression(&self, target: ParticipantId) {
        let sets = Arc::clone(&self.sets);
        let broadcaster = Arc::clone(&self.broadcaster);
        self.scheduler.after(
            self.suppress_delay,
            Box::new(move || {
                // Shown again while the callback was pending: stale, skip.
                if !sets.lock().hidden.contains(&target) {
                    trace!("Deferred suppression of {} is stale; skipping", target);
                    return;
                }
                broadcaster.suppress(&target);
            }),
        );
    }
}

impl OutboundHook for RosterInterceptor {
    fn on_outbound(&self, recipient: &ParticipantId, message: &mut RosterMessage) {
        if message.action != RosterAction::Add {
            return;
        }
        let Some(entry) = message.first_entry_mut() else {
            return;
        };
        // Placeholder and preview entries don't resolve; leave them alone.
        let Some(target) = self.sessions.resolve(&entry.id) else {
            trace!("Unresolved roster entry {}; passing through", entry.id);
            return;
        };
        {
            let sets = self.sets.lock();
            if !sets.hidden.contains(&target.id) {
                return;
            }
            if recipient == &target.id && sets.exempt.contains(&target.id) {
                trace!(
                    "Self-view of {} exempt during fix; passing through",
                    target.id
                );
                return;
            }
        }

        // Keep the action ADD and the identity so the recipient still spawns
        // the entity; the blank label is what empties the roster row. The
        // latency value stays live.
        entry.label.clear();
        trace!(
            "Blanked roster entry for hidden {} bound for {}",
            target.id,
            recipient
        );
        self.schedule_suppression(target.id);
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
        GameMode, Latency, LatencyProbe, Participant, RosterEntry, Transport, VeilError,
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

    struct ZeroProbe;

    impl LatencyProbe for ZeroProbe {
        fn latency_of(&self, _: &ParticipantId) -> Result<Latency, VeilError> {
            Ok(0)
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

    /// Collects submitted callbacks; `run_all` fires them.
    #[derive(Default)]
    struct CollectingScheduler {
        tasks: Mutex<Vec<(Ticks, Box<dyn FnOnce() + Send>)>>,
    }

    impl Scheduler for CollectingScheduler {
        fn after(&self, delay: Ticks, task: Box<dyn FnOnce() + Send>) {
            self.tasks.lock().push((delay, task));
        }
    }

    impl CollectingScheduler {
        fn run_all(&self) {
            let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
            for (_, task) in tasks {
                task();
            }
        }
    }

    struct Harness {
        interceptor: RosterInterceptor,
        sets: Arc<Mutex<VisibilitySets>>,
        transport: Arc<Recording>,
        scheduler: Arc<CollectingScheduler>,
    }

    fn harness(participants: Vec<Participant>) -> Harness {
        let sets = Arc::new(Mutex::new(VisibilitySets::default()));
        let sessions = Arc::new(FixedSessions { participants });
        let transport = Arc::new(Recording {
            sent: Mutex::new(Vec::new()),
        });
        let scheduler = Arc::new(CollectingScheduler::default());
        let broadcaster = Arc::new(RosterBroadcaster::new(
            sessions.clone(),
            transport.clone(),
            Arc::new(ZeroProbe),
        ));
        let interceptor = RosterInterceptor::new(
            sets.clone(),
            sessions,
            broadcaster,
            scheduler.clone(),
            Ticks::new(10),
        );
        Harness {
            interceptor,
            sets,
            transport,
            scheduler,
        }
    }

    fn add_for(participant: &Participant) -> RosterMessage {
        RosterMessage::single(
            RosterAction::Add,
            RosterEntry::from_participant(participant, participant.latency),
        )
    }

    fn alice() -> Participant {
        Participant::new("alice", GameMode::Standard, 30, "Alice")
    }

    fn bob() -> Participant {
        Participant::new("bob", GameMode::Standard, 40, "Bob")
    }

    #[test]
    fn test_remove_messages_pass_through() {
        let h = harness(vec![alice(), bob()]);
        h.sets.lock().hidden.insert(ParticipantId::from("alice"));

        let mut msg = add_for(&alice());
        msg.action = RosterAction::Remove;
        let original = msg.clone();
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        assert_eq!(msg, original);
        assert!(h.scheduler.tasks.lock().is_empty());
    }

    #[test]
    fn test_unresolved_entry_passes_through() {
        let h = harness(vec![bob()]);
        h.sets.lock().hidden.insert(ParticipantId::from("alice"));

        let mut msg = add_for(&alice());
        let original = msg.clone();
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        assert_eq!(msg, original);
        assert!(h.scheduler.tasks.lock().is_empty());
    }

    #[test]
    fn test_visible_participant_passes_through() {
        let h = harness(vec![alice(), bob()]);

        let mut msg = add_for(&alice());
        let original = msg.clone();
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        assert_eq!(msg, original);
        assert!(h.scheduler.tasks.lock().is_empty());
    }

    #[test]
    fn test_hidden_participant_is_blanked_and_scheduled() {
        let h = harness(vec![alice(), bob()]);
        h.sets.lock().hidden.insert(ParticipantId::from("alice"));

        let mut msg = add_for(&alice());
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        assert_eq!(msg.action, RosterAction::Add);
        let entry = msg.first_entry().unwrap();
        assert_eq!(entry.id.as_str(), "alice");
        assert_eq!(entry.label, "");
        assert_eq!(entry.latency, 30);

        let tasks = h.scheduler.tasks.lock();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, Ticks::new(10));
    }

    #[test]
    fn test_exempt_self_view_passes_through() {
        let h = harness(vec![alice(), bob()]);
        {
            let mut sets = h.sets.lock();
            sets.hidden.insert(ParticipantId::from("alice"));
            sets.exempt.insert(ParticipantId::from("alice"));
        }

        let mut msg = add_for(&alice());
        let original = msg.clone();
        h.interceptor
            .on_outbound(&ParticipantId::from("alice"), &mut msg);

        assert_eq!(msg, original);
        assert!(h.scheduler.tasks.lock().is_empty());
    }

    #[test]
    fn test_exemption_only_covers_self_view() {
        let h = harness(vec![alice(), bob()]);
        {
            let mut sets = h.sets.lock();
            sets.hidden.insert(ParticipantId::from("alice"));
            sets.exempt.insert(ParticipantId::from("alice"));
        }

        let mut msg = add_for(&alice());
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        assert_eq!(msg.first_entry().unwrap().label, "");
    }

    #[test]
    fn test_deferred_suppression_sends_remove() {
        let h = harness(vec![alice(), bob()]);
        h.sets.lock().hidden.insert(ParticipantId::from("alice"));

        let mut msg = add_for(&alice());
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);
        h.scheduler.run_all();

        let sent = h.transport.sent.lock();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|(m, _)| m.action == RosterAction::Remove));
    }

    #[test]
    fn test_stale_deferred_suppression_is_noop() {
        let h = harness(vec![alice(), bob()]);
        h.sets.lock().hidden.insert(ParticipantId::from("alice"));

        let mut msg = add_for(&alice());
        h.interceptor.on_outbound(&ParticipantId::from("bob"), &mut msg);

        // Shown again before the delay elapses.
        h.sets.lock().hidden.remove(&ParticipantId::from("alice"));
        h.scheduler.run_all();

        assert!(h.transport.sent.lock().is_empty());
    }
}
