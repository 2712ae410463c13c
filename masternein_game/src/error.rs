// Error types for the client side of the game.
//
// Every `SessionError` is recoverable: the machine turns it into a raised
// `SessionEvent::Error` whose message lands in `SessionContext::error` for
// the presentation layer to show. Nothing here aborts the machine.

use masternein_protocol::TransportError;

/// Failure talking to the identity store.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("stored player id is empty")]
    EmptyPlayerId,
    #[error("identity store lock poisoned")]
    Poisoned,
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Recoverable errors surfaced to the participant.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("error getting a player id for you: {0}")]
    Identity(#[from] IdentityError),
    #[error("player identity is still loading")]
    IdentityPending,
    #[error("{0}")]
    Relay(String),
    #[error("a guess arrived before the secret code was set")]
    SecretNotSet,
    #[error("connection problem: {0}")]
    Transport(#[from] TransportError),
}
