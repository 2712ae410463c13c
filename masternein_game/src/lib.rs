// masternein_game — client-side game logic for Masternein.
//
// Everything a participant's process needs apart from the socket and the
// screen: the feedback engine that scores guesses, and the per-participant
// session state machine that tracks role, room membership, and round
// progress. The machine talks to the relay only through the
// `masternein_protocol::Transport` trait, so it runs unchanged against a real
// `NetClient` or an in-memory recording transport.
//
// Module overview:
// - `feedback.rs`: `score`, `is_winning_rack`, palette cycling, random racks.
// - `state.rs`:    `SessionState` tagged union and its dotted `value()` path.
// - `context.rs`:  `SessionContext`, the data the machine carries, and the
//                  mutations actions perform on it.
// - `event.rs`:    `SessionEvent` and the mapping from relay messages.
// - `machine.rs`:  `SessionMachine` and the `(state, event)` transition table.
// - `identity.rs`: identity store trait, file and memory stores, background
//                  loader.
// - `error.rs`:    `SessionError`, `IdentityError`.
//
// Dependencies: `masternein_protocol` (wire types), `masternein_prng`
// (random racks). No dependency on the relay crate.

pub mod context;
pub mod error;
pub mod event;
pub mod feedback;
pub mod identity;
pub mod machine;
pub mod state;

pub use context::{DEFAULT_ATTEMPT_LIMIT, DEFAULT_DISPLAY_NAME, SessionContext};
pub use error::{IdentityError, SessionError};
pub use event::SessionEvent;
pub use feedback::{Feedback, is_equal_rack, is_winning_rack, random_rack, score};
pub use identity::{
    FileIdentityStore, IdentityStore, MemoryIdentityStore, SharedIdentityStore, load_identity,
    spawn_load,
};
pub use machine::{Action, HOST_LEFT_MESSAGE, SessionMachine, Transition, transition};
pub use state::{HostPhase, Outcome, PlayerPhase, SessionState};
