// masternein_protocol — wire protocol for the Masternein relay.
//
// This crate defines the value types, message enums, framing, and outbound
// transport seam shared by the relay (`masternein_relay`) and the client-side
// session machine (`masternein_game`). It depends on neither.
//
// Module overview:
// - `types.rs`:     Colour, Rack, Palette, Attempt, Player, PlayerId, RoomCode.
// - `message.rs`:   `ClientMessage` / `ServerMessage` enums and the host's
//                   published `GameState`.
// - `framing.rs`:   Length-delimited JSON frames over any `Read`/`Write`.
// - `transport.rs`: `Transport` trait the session machine sends through, plus
//                   an in-memory `RecordingTransport`.
//
// Design decisions:
// - **JSON payloads.** Messages are small and human-readable captures are
//   worth more than the bytes saved by a binary encoding.
// - **Shape checks in the types.** A rack is `[Colour; 4]` and a palette
//   refuses to decode empty, so malformed payloads fail at the frame boundary
//   instead of deep inside the relay or the machine.
// - **No async runtime.** Framing uses `std::io::Read`/`Write`, matching the
//   relay's thread-per-reader design.

pub mod framing;
pub mod message;
pub mod transport;
pub mod types;

pub use framing::{FrameError, MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{ClientMessage, GameState, InvalidGameState, ServerMessage};
pub use transport::{RecordingTransport, Transport, TransportError};
pub use types::{
    Attempt, Colour, Palette, Player, PlayerId, RACK_LEN, ROOM_CODE_ALPHABET, ROOM_CODE_LEN,
    Rack, RoomCode,
};
