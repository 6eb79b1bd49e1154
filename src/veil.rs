//! The public facade wiring registry, broadcaster, and interceptor together.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    HookId, LatencyProbe, PacketStream, ParticipantId, RosterBroadcaster, RosterInterceptor,
    Scheduler, SessionTable, Ticks, Transport, VisibilityRegistry, SUPPRESS_DELAY_TICKS,
};

/// Builds a [`RosterVeil`] from its five collaborators.
///
/// All collaborators are injected explicitly; there is no global accessor
/// anywhere in this crate. The suppress delay defaults to
/// [`SUPPRESS_DELAY_TICKS`] and is the only tunable.
#[must_use = "VeilBuilder must be consumed by calling build()"]
pub struct VeilBuilder {
    sessions: Arc<dyn SessionTable>,
    transport: Arc<dyn Transport>,
    stream: Arc<dyn PacketStream>,
    scheduler: Arc<dyn Scheduler>,
    probe: Arc<dyn LatencyProbe>,
    suppress_delay: Ticks,
}

impl VeilBuilder {
    /// Creates a builder over the given collaborators.
    pub fn new(
        sessions: Arc<dyn SessionTable>,
        transport: Arc<dyn Transport>,
        stream: Arc<dyn PacketStream>,
        scheduler: Arc<dyn Scheduler>,
        probe: Arc<dyn LatencyProbe>,
    ) -> Self {
        VeilBuilder {
            sessions,
            transport,
            stream,
            scheduler,
            probe,
            suppress_delay: SUPPRESS_DELAY_TICKS,
        }
    }

    /// Overrides the delay between a rewritten ADD and its deferred REMOVE.
    ///
    /// The delay must stay comfortably above message delivery latency so the
    /// recipient finishes spawning the entity before the REMOVE lands.
    pub fn with_suppress_delay(mut self, delay: Ticks) -> Self {
        self.suppress_delay = delay;
        self
    }

    /// Consumes the builder and wires up the veil. The interceptor is not
    /// attached to the packet stream until [`RosterVeil::start`] is called.
    pub fn build(self) -> RosterVeil {
        let broadcaster = Arc::new(RosterBroadcaster::new(
            Arc::clone(&self.sessions),
            self.transport,
            self.probe,
        ));
        let registry = VisibilityRegistry::new(Arc::clone(&broadcaster));
        let interceptor = Arc::new(RosterInterceptor::new(
            registry.shared_sets(),
            self.sessions,
            broadcaster,
            self.scheduler,
            self.suppress_delay,
        ));
        RosterVeil {
            registry,
            interceptor,
            stream: self.stream,
            subscription: Mutex::new(None),
        }
    }
}

/// The assembled engine: visibility operations plus interceptor lifecycle.
///
/// `hide`/`show`/`is_visible`/`fix`/`hidden_players` delegate to the
/// [`VisibilityRegistry`] and work whether or not interception is started;
/// [`start`](RosterVeil::start) and [`stop`](RosterVeil::stop) control only
/// the outbound hook. Dropping the veil detaches the hook.
pub struct RosterVeil {
    registry: VisibilityRegistry,
    interceptor: Arc<RosterInterceptor>,
    stream: Arc<dyn PacketStream>,
    subscription: Mutex<Option<HookId>>,
}

impl RosterVeil {
    /// Attaches the interceptor to the outbound packet stream.
    ///
    /// Idempotent: calling `start` while already started does nothing.
    pub fn start(&self) {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return;
        }
        let interceptor: Arc<dyn crate::OutboundHook> = self.interceptor.clone();
        let hook = self.stream.attach(interceptor);
        debug!("Roster interception started ({:?})", hook);
        *subscription = Some(hook);
    }

    /// Detaches the interceptor from the outbound packet stream.
    ///
    /// Idempotent; already-scheduled deferred suppressions still run (they
    /// are safe no-ops once their target is shown or disconnected).
    pub fn stop(&self) {
        if let Some(hook) = self.subscription.lock().take() {
            debug!("Roster interception stopped ({:?})", hook);
            self.stream.detach(hook);
        }
    }

    /// Hides a participant. See [`VisibilityRegistry::hide`].
    pub fn hide(&self, id: &ParticipantId) -> bool {
        self.registry.hide(id)
    }

    /// Shows a participant. See [`VisibilityRegistry::show`].
    pub fn show(&self, id: &ParticipantId) -> bool {
        self.registry.show(id)
    }

    /// Returns whether a participant is visible. See
    /// [`VisibilityRegistry::is_visible`].
    #[must_use]
    pub fn is_visible(&self, id: &ParticipantId) -> bool {
        self.registry.is_visible(id)
    }

    /// Reconciles a hidden participant's self-view after a game-mode change.
    /// See [`VisibilityRegistry::fix`].
    pub fn fix(&self, id: &ParticipantId) {
        self.registry.fix(id);
    }

    /// Snapshot of all hidden identifiers. See
    /// [`VisibilityRegistry::hidden_players`].
    #[must_use]
    pub fn hidden_players(&self) -> HashSet<ParticipantId> {
        self.registry.hidden_players()
    }
}

impl Drop for RosterVeil {
    fn drop(&mut self) {
        self.stop();
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
    use crate::{Latency, OutboundHook, Participant, RosterMessage, VeilError};

    struct EmptySessions;

    impl SessionTable for EmptySessions {
        fn resolve(&self, _: &ParticipantId) -> Option<Participant> {
            None
        }

        fn connected(&self) -> Vec<Participant> {
            Vec::new()
        }
    }

    struct NullTransport;

    impl Transport for NullTransport {
        fn transmit(&self, _: &RosterMessage, _: &ParticipantId) -> Result<(), VeilError> {
            Ok(())
        }
    }

    struct NullScheduler;

    impl Scheduler for NullScheduler {
        fn after(&self, _: Ticks, _: Box<dyn FnOnce() + Send>) {}
    }

    struct NullProbe;

    impl LatencyProbe for NullProbe {
        fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError> {
            Err(VeilError::LatencyUnavailable {
                participant: id.clone(),
            })
        }
    }

    #[derive(Default)]
    struct CountingStream {
        attached: Mutex<Vec<HookId>>,
        next_id: Mutex<u64>,
    }

    impl PacketStream for CountingStream {
        fn attach(&self, _: Arc<dyn OutboundHook>) -> HookId {
            let mut next = self.next_id.lock();
            let id = HookId::new(*next);
            *next += 1;
            self.attached.lock().push(id);
            id
        }

        fn detach(&self, hook: HookId) {
            self.attached.lock().retain(|h| *h != hook);
        }
    }

    fn veil_with_stream() -> (RosterVeil, Arc<CountingStream>) {
        let stream = Arc::new(CountingStream::default());
        let veil = VeilBuilder::new(
            Arc::new(EmptySessions),
            Arc::new(NullTransport),
            stream.clone(),
            Arc::new(NullScheduler),
            Arc::new(NullProbe),
        )
        .with_suppress_delay(Ticks::new(4))
        .build();
        (veil, stream)
    }

    #[test]
    fn test_start_and_stop_toggle_subscription() {
        let (veil, stream) = veil_with_stream();
        assert!(stream.attached.lock().is_empty());

        veil.start();
        assert_eq!(stream.attached.lock().len(), 1);

        veil.stop();
        assert!(stream.attached.lock().is_empty());
    }

    #[test]
    fn test_start_is_idempotent() {
        let (veil, stream) = veil_with_stream();
        veil.start();
        veil.start();
        assert_eq!(stream.attached.lock().len(), 1);
        veil.stop();
        veil.stop();
        assert!(stream.attached.lock().is_empty());
    }

    #[test]
    fn test_drop_detaches_hook() {
        let (veil, stream) = veil_with_stream();
        veil.start();
        drop(veil);
        assert!(stream.attached.lock().is_empty());
    }

    #[test]
    fn test_visibility_operations_work_without_start() {
        let (veil, _) = veil_with_stream();
        let alice = ParticipantId::from("alice");
        assert!(veil.is_visible(&alice));
        assert!(veil.hide(&alice));
        assert!(!veil.is_visible(&alice));
        assert!(veil.hidden_players().contains(&alice));
        assert!(veil.show(&alice));
        assert!(veil.is_visible(&alice));
    }
}
