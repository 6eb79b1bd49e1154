mod common;

use common::{fixture, participant};
use roster_veil::{
    GameMode, ParticipantId, RosterAction, RosterEntry, RosterMessage,
};

fn add_message(name: &str, game_mode: GameMode, latency: u32) -> RosterMessage {
    RosterMessage::single(
        RosterAction::Add,
        RosterEntry::from_participant(&participant(name, game_mode, latency), latency),
    )
}

#[test]
fn hidden_participant_add_is_blanked_but_still_an_add() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.transport.clear();

    let out = f
        .stream
        .emit(&ParticipantId::from("bob"), add_message("alice", GameMode::Standard, 30));

    assert_eq!(out.action, RosterAction::Add);
    let entry = out.first_entry().expect("single entry");
    assert_eq!(entry.id, alice);
    assert_eq!(entry.label, "");
    // Latency policy: the live value stays.
    assert_eq!(entry.latency, 30);
    assert_eq!(f.scheduler.pending(), 1);
}

#[test]
fn deferred_remove_fires_after_the_full_delay() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.transport.clear();
    f.stream
        .emit(&ParticipantId::from("bob"), add_message("alice", GameMode::Standard, 30));

    f.scheduler.advance(9);
    assert!(f.transport.sent().is_empty());

    f.scheduler.advance(1);
    let sent = f.transport.sent();
    assert!(!sent.is_empty());
    assert!(sent.iter().all(|(m, _)| m.action == RosterAction::Remove));
    let recipients: Vec<&str> = sent.iter().map(|(_, r)| r.as_str()).collect();
    assert_eq!(recipients, vec!["alice", "bob"]);
}

#[test]
fn deferred_remove_excludes_spectating_target() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Spectator, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.transport.clear();
    f.stream
        .emit(&ParticipantId::from("bob"), add_message("alice", GameMode::Spectator, 30));
    f.scheduler.advance(10);

    let recipients: Vec<String> = f
        .transport
        .sent()
        .iter()
        .map(|(_, r)| r.to_string())
        .collect();
    assert_eq!(recipients, vec!["bob"]);
}

#[test]
fn visible_participant_add_passes_through_untouched() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));

    f.veil.start();
    let original = add_message("alice", GameMode::Standard, 30);
    let out = f.stream.emit(&ParticipantId::from("bob"), original.clone());

    assert_eq!(out, original);
    assert_eq!(f.scheduler.pending(), 0);
}

#[test]
fn remove_messages_are_never_touched() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);

    let mut original = add_message("alice", GameMode::Standard, 30);
    original.action = RosterAction::Remove;
    let out = f.stream.emit(&ParticipantId::from("bob"), original.clone());

    assert_eq!(out, original);
}

#[test]
fn placeholder_entry_passes_through() {
    let f = fixture();
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    // "alice" is hidden but not connected; her entry is a preview row.
    f.veil.start();
    f.veil.hide(&ParticipantId::from("alice"));
    f.transport.clear();

    let original = add_message("alice", GameMode::Standard, 30);
    let out = f.stream.emit(&ParticipantId::from("bob"), original.clone());

    assert_eq!(out, original);
    assert_eq!(f.scheduler.pending(), 0);
}

#[test]
fn stale_callback_after_disconnect_is_a_silent_noop() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.transport.clear();
    f.stream
        .emit(&ParticipantId::from("bob"), add_message("alice", GameMode::Standard, 30));

    f.sessions.disconnect(&alice);
    f.scheduler.advance(10);

    assert!(f.transport.sent().is_empty());
}

#[test]
fn stale_callback_after_show_is_a_noop() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.stream
        .emit(&ParticipantId::from("bob"), add_message("alice", GameMode::Standard, 30));

    f.veil.show(&alice);
    f.transport.clear();
    f.scheduler.advance(10);

    assert!(f.transport.sent().is_empty());
    assert!(f.veil.is_visible(&alice));
}

#[test]
fn stopped_veil_no_longer_intercepts() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.veil.stop();
    assert!(!f.stream.has_hook());

    let original = add_message("alice", GameMode::Standard, 30);
    let out = f.stream.emit(&ParticipantId::from("bob"), original.clone());
    assert_eq!(out, original);
}

#[test]
fn only_the_first_entry_is_inspected() {
    let f = fixture();
    f.sessions.connect(participant("alice", GameMode::Standard, 30));
    f.sessions.connect(participant("bob", GameMode::Standard, 40));
    let alice = ParticipantId::from("alice");

    f.veil.start();
    f.veil.hide(&alice);
    f.transport.clear();

    // Hidden alice in the second slot of a multi-entry ADD stays untouched.
    let mut message = add_message("bob", GameMode::Standard, 40);
    message.entries.push(RosterEntry::from_participant(
        &participant("alice", GameMode::Standard, 30),
        30,
    ));
    let out = f.stream.emit(&ParticipantId::from("carol"), message.clone());

    assert_eq!(out, message);
    assert_eq!(f.scheduler.pending(), 0);
}
