// End-to-end integration tests for the multiplayer pipeline.
//
// Each test starts a real relay server, connects real `NetClient` instances
// (via `TestGameClient`), and verifies the full path:
// intent → host machine → relay → player machine → state, and back.
//
// These tests exercise the same code paths as a live participant (`NetClient`
// from the relay crate, `SessionMachine` from the game crate); the only
// test-specific code is the synchronous polling wrappers in `TestGameClient`.

use masternein_game::{HOST_LEFT_MESSAGE, SessionEvent};
use masternein_protocol::{Colour, Rack};
use masternein_relay::server::{RelayConfig, RelayHandle, start_relay};
use multiplayer_tests::TestGameClient;

const SECRET: Rack = Rack([Colour::Red, Colour::Red, Colour::Blue, Colour::White]);

fn start() -> (RelayHandle, std::net::SocketAddr) {
    start_relay(RelayConfig {
        port: 0,
        ..RelayConfig::default()
    })
    .unwrap()
}

/// Start a relay, have one participant host a room and another join it.
/// Returns once the player has received the host's first state.
fn start_test_room() -> (RelayHandle, TestGameClient, TestGameClient) {
    let (handle, addr) = start();

    let mut host = TestGameClient::connect(addr, "host-id", "Hana");
    host.send(SessionEvent::Host {
        room_code: String::new(),
    });
    host.poll_until_state("host.active");
    let code = host.room_code().expect("host has a room code");

    let mut player = TestGameClient::connect(addr, "player-id", "Pim");
    player.send(SessionEvent::Join {
        room_code: code.to_string(),
    });
    host.poll_until("the joiner in the player list", |m| {
        m.context().player_list.len() == 2
    });
    player.poll_until_state("player.inactive");
    assert_eq!(player.room_code(), Some(code));

    (handle, host, player)
}

/// Host locks in `SECRET`; the player is released to guess.
fn set_secret(host: &mut TestGameClient, player: &mut TestGameClient) {
    host.send(SessionEvent::ReplaceRack { rack: SECRET });
    host.send(SessionEvent::SetCode);
    assert_eq!(host.state(), "host.inactive");
    player.poll_until_state("player.active");
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

/// The player sees the host's roster, and a scored attempt comes back to
/// them through the host's republished state.
#[test]
fn attempt_is_scored_by_host_and_mirrored() {
    let (handle, mut host, mut player) = start_test_room();

    let host_entry = player.player("host-id").expect("host in player's list");
    assert!(host_entry.host);
    assert_eq!(host_entry.display_name, "Hana");

    set_secret(&mut host, &mut player);

    let guess = Rack([Colour::Red, Colour::Blue, Colour::Red, Colour::White]);
    player.send(SessionEvent::Attempt { rack: guess });
    host.poll_until("the first attempt", |m| m.context().attempts.len() == 1);
    player.poll_until("the mirrored attempt", |m| {
        m.context().attempts.len() == 1
    });

    let attempt = player.machine.context().attempts[0];
    assert_eq!(attempt.rack, guess);
    assert_eq!(attempt.index, 0);
    assert_eq!((attempt.single, attempt.double), (2, 2));
    assert_eq!(host.machine.context().attempts[0], attempt);
    assert_eq!(host.state(), "host.inactive");
    assert_eq!(player.state(), "player.active");

    handle.stop();
}

/// Guessing the secret ends the round as a success on both sides.
#[test]
fn winning_guess_ends_round() {
    let (handle, mut host, mut player) = start_test_room();
    set_secret(&mut host, &mut player);

    player.send(SessionEvent::Attempt { rack: SECRET });
    host.poll_until_state("host.ended.success");
    player.poll_until_state("player.ended.success");
    assert!(host.machine.context().attempts.is_empty());

    handle.stop();
}

/// Running out of attempts ends the round as a failure.
#[test]
fn attempt_limit_ends_round_in_failure() {
    let (handle, mut host, mut player) = start_test_room();
    host.send(SessionEvent::SetAttemptLimit { limit: 2 });
    player.poll_until("the new attempt limit", |m| {
        m.context().attempt_limit == 2
    });
    set_secret(&mut host, &mut player);

    let miss = Rack([Colour::Gray; 4]);
    player.send(SessionEvent::Attempt { rack: miss });
    player.poll_until("the first miss", |m| m.context().attempts.len() == 1);
    player.send(SessionEvent::Attempt { rack: miss });
    host.poll_until_state("host.ended.failure");
    player.poll_until_state("player.ended.failure");

    handle.stop();
}

/// When the host leaves, the player is returned to the menu with a message.
#[test]
fn host_disconnect_returns_player_to_menu() {
    let (handle, mut host, mut player) = start_test_room();

    host.disconnect();
    player.poll_until_state("menu");
    assert_eq!(player.machine.take_error().as_deref(), Some(HOST_LEFT_MESSAGE));
    assert_eq!(player.room_code(), None);
    assert!(player.machine.context().player_list.is_empty());

    handle.stop();
}

/// Joining a room nobody hosts bounces back to the menu with the relay's
/// error.
#[test]
fn joining_unknown_room_fails() {
    let (handle, addr) = start();

    let mut player = TestGameClient::connect(addr, "player-id", "Pim");
    player.send(SessionEvent::Join {
        room_code: "ZZZZZZZZ".into(),
    });
    assert_eq!(player.state(), "player.connecting");
    player.poll_until("the relay's error", |m| m.context().error.is_some());
    assert_eq!(player.state(), "menu");
    assert_eq!(
        player.machine.take_error().as_deref(),
        Some("room does not exist")
    );

    handle.stop();
}

/// A name change by the player shows up in the host's roster.
#[test]
fn display_name_change_reaches_host() {
    let (handle, mut host, mut player) = start_test_room();

    player.send(SessionEvent::NewDisplayName {
        display_name: "  Pip  ".into(),
    });
    assert_eq!(player.machine.display_name(), "Pip");
    host.poll_until("the renamed player", |m| {
        m.context()
            .player_list
            .iter()
            .any(|p| p.id.as_str() == "player-id" && p.display_name == "Pip")
    });

    handle.stop();
}

/// After a round, the host hands the seat to the player, who then starts the
/// next round as host.
#[test]
fn host_handoff_after_round() {
    let (handle, mut host, mut player) = start_test_room();
    set_secret(&mut host, &mut player);
    player.send(SessionEvent::Attempt { rack: SECRET });
    host.poll_until_state("host.ended.success");
    player.poll_until_state("player.ended.success");

    let target = host.player("player-id").expect("player in host's list");
    host.send(SessionEvent::MakePlayerHost { player: target });
    assert_eq!(host.state(), "player.ended.success");
    player.poll_until_state("host.ended.success");

    let new_host = player.player("player-id").expect("self in list");
    assert!(new_host.host);
    assert_eq!(player.machine.context().host_count(), 1);

    player.send(SessionEvent::NewGame);
    assert_eq!(player.state(), "host.active");
    host.poll_until_state("player.inactive");

    // The new host's room is still the same room.
    assert_eq!(player.room_code(), host.room_code());

    handle.stop();
}

/// Someone who joins after the round ended can be handed the seat and start
/// the next round.
#[test]
fn handoff_to_late_joiner() {
    let (handle, addr) = start();
    let mut host = TestGameClient::connect(addr, "host-id", "Hana");
    host.send(SessionEvent::Host {
        room_code: String::new(),
    });
    host.poll_until_state("host.active");
    let code = host.room_code().expect("host has a room code");

    let mut player = TestGameClient::connect(addr, "player-id", "Pim");
    player.send(SessionEvent::Join {
        room_code: code.to_string(),
    });
    host.poll_until("the joiner in the player list", |m| {
        m.context().player_list.len() == 2
    });
    player.poll_until_state("player.inactive");
    set_secret(&mut host, &mut player);
    player.send(SessionEvent::Attempt { rack: SECRET });
    host.poll_until_state("host.ended.success");
    player.poll_until_state("player.ended.success");

    let mut late = TestGameClient::connect(addr, "late-id", "Lou");
    late.send(SessionEvent::Join {
        room_code: code.to_string(),
    });
    host.poll_until("the late joiner in the player list", |m| {
        m.context().player_list.len() == 3
    });
    late.poll_until_state("player.inactive");

    let target = host.player("late-id").expect("late joiner in host's list");
    host.send(SessionEvent::MakePlayerHost { player: target });
    assert_eq!(host.state(), "player.ended.success");
    late.poll_until_state("host.ended.failure");
    assert_eq!(late.player("late-id").map(|p| p.host), Some(true));
    assert_eq!(late.machine.context().host_count(), 1);
    player.poll_until("the new host flag", |m| {
        m.context()
            .player_list
            .iter()
            .any(|p| p.id.as_str() == "late-id" && p.host)
    });

    late.send(SessionEvent::NewGame);
    assert_eq!(late.state(), "host.active");
    host.poll_until_state("player.inactive");
    player.poll_until_state("player.inactive");

    handle.stop();
}
