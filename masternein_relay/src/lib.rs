// masternein_relay — room relay for Masternein.
//
// The relay is a thin message broker: it accepts TCP connections from
// participants, groups them into rooms keyed by an eight-character code, and
// forwards host and player messages between the members of each room. It never
// scores a guess or tracks a round; all game logic stays on the clients.
//
// Module overview:
// - `room.rs`:   `RoomRegistry`, the connection table and room membership.
//                Routes every client message and produces the relay's replies.
// - `server.rs`: TCP listener, reader threads (one per client), and the main
//                event loop. Uses `std::net` with a thread-per-reader
//                architecture and an `mpsc` channel to funnel events into the
//                single-threaded `RoomRegistry`.
// - `client.rs`: `NetClient`, the participant's side of a connection. Plugs
//                into the session machine as its `Transport`.
// - `error.rs`:  `RelayError`, whose text is sent back as `error` messages.
//
// Dependencies: `masternein_protocol` (shared message types and framing),
// `masternein_prng` (room codes). No dependency on the game crate.
//
// The relay can run as a standalone binary (`main.rs`) or be embedded in a
// test or game process via the library API (`start_relay`).

pub mod client;
pub mod error;
pub mod room;
pub mod server;

pub use client::{ClientError, NetClient};
pub use error::RelayError;
pub use server::{DEFAULT_PORT, RelayConfig, RelayHandle, start_relay};
