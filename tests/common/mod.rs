//! Shared stub collaborators for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use roster_veil::{
    GameMode, HookId, Latency, LatencyProbe, OutboundHook, PacketStream, Participant,
    ParticipantId, RosterMessage, Scheduler, SessionTable, Ticks, Transport, VeilBuilder,
    VeilError, RosterVeil,
};

/// In-memory connection table. Doubles as the latency probe: measurements
/// come from the stored participant, and absent participants fail the probe.
#[derive(Default)]
pub struct StubSessions {
    participants: Mutex<HashMap<ParticipantId, Participant>>,
}

impl StubSessions {
    #[allow(dead_code)]
    pub fn connect(&self, participant: Participant) {
        self.participants
            .lock()
            .insert(participant.id.clone(), participant);
    }

    #[allow(dead_code)]
    pub fn disconnect(&self, id: &ParticipantId) {
        self.participants.lock().remove(id);
    }

    #[allow(dead_code)]
    pub fn set_game_mode(&self, id: &ParticipantId, game_mode: GameMode) {
        if let Some(participant) = self.participants.lock().get_mut(id) {
            participant.game_mode = game_mode;
        }
    }
}

impl SessionTable for StubSessions {
    fn resolve(&self, id: &ParticipantId) -> Option<Participant> {
        self.participants.lock().get(id).cloned()
    }

    fn connected(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl LatencyProbe for StubSessions {
    fn latency_of(&self, id: &ParticipantId) -> Result<Latency, VeilError> {
        self.resolve(id)
            .map(|p| p.latency)
            .ok_or_else(|| VeilError::LatencyUnavailable {
                participant: id.clone(),
            })
    }
}

/// Records every transmitted message; can be told to fail for specific
/// recipients.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(RosterMessage, ParticipantId)>>,
    fail_for: Mutex<HashSet<ParticipantId>>,
}

impl RecordingTransport {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<(RosterMessage, ParticipantId)> {
        self.sent.lock().clone()
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    #[allow(dead_code)]
    pub fn fail_deliveries_to(&self, id: ParticipantId) {
        self.fail_for.lock().insert(id);
    }
}

impl Transport for RecordingTransport {
    fn transmit(
        &self,
        message: &RosterMessage,
        recipient: &ParticipantId,
    ) -> Result<(), VeilError> {
        if self.fail_for.lock().contains(recipient) {
            return Err(VeilError::Transmission {
                recipient: recipient.clone(),
                context: "stubbed failure".to_owned(),
            });
        }
        self.sent.lock().push((message.clone(), recipient.clone()));
        Ok(())
    }
}

/// Tick-driven scheduler: callbacks run when `advance` moves the clock past
/// their due tick. Nothing runs without an explicit `advance`.
#[derive(Default)]
pub struct ManualScheduler {
    now: Mutex<u64>,
    tasks: Mutex<Vec<(u64, Box<dyn FnOnce() + Send>)>>,
}

impl ManualScheduler {
    #[allow(dead_code)]
    pub fn advance(&self, ticks: u64) {
        let deadline = {
            let mut now = self.now.lock();
            *now += ticks;
            *now
        };
        loop {
            let due = {
                let mut tasks = self.tasks.lock();
                match tasks.iter().position(|(at, _)| *at <= deadline) {
                    Some(index) => tasks.remove(index),
                    None => break,
                }
            };
            (due.1)();
        }
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Ticks, task: Box<dyn FnOnce() + Send>) {
        let at = *self.now.lock() + delay.as_u64();
        self.tasks.lock().push((at, task));
    }
}

/// Single-hook outbound stream. `emit` pushes a message through the attached
/// hook (if any) and returns what would have gone out on the wire.
#[derive(Default)]
pub struct StubStream {
    hook: Mutex<Option<(HookId, Arc<dyn OutboundHook>)>>,
    next_id: Mutex<u64>,
}

impl StubStream {
    #[allow(dead_code)]
    pub fn emit(&self, recipient: &ParticipantId, mut message: RosterMessage) -> RosterMessage {
        let hook = self.hook.lock().as_ref().map(|(_, h)| Arc::clone(h));
        if let Some(hook) = hook {
            hook.on_outbound(recipient, &mut message);
        }
        message
    }

    #[allow(dead_code)]
    pub fn has_hook(&self) -> bool {
        self.hook.lock().is_some()
    }
}

impl PacketStream for StubStream {
    fn attach(&self, hook: Arc<dyn OutboundHook>) -> HookId {
        let mut next = self.next_id.lock();
        let id = HookId::new(*next);
        *next += 1;
        *self.hook.lock() = Some((id, hook));
        id
    }

    fn detach(&self, hook: HookId) {
        let mut slot = self.hook.lock();
        if slot.as_ref().is_some_and(|(id, _)| *id == hook) {
            *slot = None;
        }
    }
}

/// A fully wired veil over stub collaborators.
pub struct Fixture {
    pub veil: RosterVeil,
    pub sessions: Arc<StubSessions>,
    pub transport: Arc<RecordingTransport>,
    pub scheduler: Arc<ManualScheduler>,
    pub stream: Arc<StubStream>,
}

#[allow(dead_code)]
pub fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let sessions = Arc::new(StubSessions::default());
    let transport = Arc::new(RecordingTransport::default());
    let scheduler = Arc::new(ManualScheduler::default());
    let stream = Arc::new(StubStream::default());
    let veil = VeilBuilder::new(
        sessions.clone(),
        transport.clone(),
        stream.clone(),
        scheduler.clone(),
        sessions.clone(),
    )
    .build();
    Fixture {
        veil,
        sessions,
        transport,
        scheduler,
        stream,
    }
}

#[allow(dead_code)]
pub fn participant(name: &str, game_mode: GameMode, latency: Latency) -> Participant {
    let mut label = String::from(name);
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Participant::new(name, game_mode, latency, label)
}
