// Relay-side request errors.
//
// Every variant is reported back to the offending connection as
// `ServerMessage::Error { message }` using the `Display` text below, so the
// wording is user-facing. None of them close the connection except
// `InvalidPlayerId`, which is raised only during the handshake.

use masternein_protocol::InvalidGameState;
use masternein_protocol::types::InvalidRoomCode;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("player id is required")]
    InvalidPlayerId,
    #[error("already connected")]
    UnexpectedHello,
    #[error("room does not exist")]
    RoomNotFound,
    #[error("{0}")]
    InvalidRoomCode(#[from] InvalidRoomCode),
    #[error("room is already hosted")]
    RoomAlreadyHosted,
    #[error("already in this room")]
    AlreadyInRoom,
    #[error("not in a room")]
    NotInRoom,
    #[error("only the host can send {0}")]
    NotHost(&'static str),
    #[error("the host cannot send {0}")]
    HostCannotSend(&'static str),
    #[error("invalid host state: {0}")]
    InvalidHostState(#[from] InvalidGameState),
    #[error("player is not in this room")]
    UnknownPlayer,
}
