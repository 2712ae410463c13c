// Test-only game client for multiplayer integration tests.
//
// Wraps a real `SessionMachine` (from `masternein_game`) driving a real
// `NetClient` (from `masternein_relay::client`) to provide a synchronous,
// test-friendly API for exercising the full pipeline:
// intent → machine → relay → other participant's machine → state.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `NetClient::poll()`). All networking and game
// logic uses the same code paths as a real participant.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use masternein_game::{MemoryIdentityStore, SessionEvent, SessionMachine, SharedIdentityStore};
use masternein_protocol::{Player, RoomCode};
use masternein_relay::client::NetClient;

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test participant: a session machine talking to the relay over TCP.
pub struct TestGameClient {
    pub machine: SessionMachine<NetClient>,
}

impl TestGameClient {
    /// Connect to a relay as `player_id` and load the identity.
    pub fn connect(addr: SocketAddr, player_id: &str, display_name: &str) -> Self {
        let client = NetClient::connect(addr, player_id).expect("TestGameClient::connect failed");
        let store: SharedIdentityStore = Arc::new(Mutex::new(MemoryIdentityStore::with_identity(
            player_id,
            display_name,
        )));
        let mut machine = SessionMachine::with_identity_store(client, store);
        assert!(
            machine.wait_for_identity(POLL_TIMEOUT),
            "identity load timed out"
        );
        Self { machine }
    }

    /// Feed a local intent to the machine.
    pub fn send(&mut self, event: SessionEvent) {
        self.machine.send(event);
    }

    /// Non-blocking: feed every queued relay message to the machine. Returns
    /// how many were applied.
    pub fn pump(&mut self) -> usize {
        let messages = self.machine.transport().poll();
        let count = messages.len();
        for msg in messages {
            self.machine.receive(msg);
        }
        count
    }

    /// Blocking pump until `done` holds for the machine.
    pub fn poll_until(&mut self, what: &str, done: impl Fn(&SessionMachine<NetClient>) -> bool) {
        let start = Instant::now();
        loop {
            self.pump();
            if done(&self.machine) {
                return;
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}; state is {}",
                self.machine.value()
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking pump until the machine's dotted state is `value`.
    pub fn poll_until_state(&mut self, value: &str) {
        self.poll_until(value, |m| m.value() == value);
    }

    /// Current dotted state path.
    pub fn state(&self) -> String {
        self.machine.value()
    }

    pub fn room_code(&self) -> Option<RoomCode> {
        self.machine.context().room_code.clone()
    }

    /// The player-list entry with `player_id`, as this participant sees it.
    pub fn player(&self, player_id: &str) -> Option<Player> {
        self.machine
            .context()
            .player_list
            .iter()
            .find(|p| p.id.as_str() == player_id)
            .cloned()
    }

    /// Send `goodbye` and close the connection.
    pub fn disconnect(&mut self) {
        self.machine.transport_mut().disconnect();
    }
}
