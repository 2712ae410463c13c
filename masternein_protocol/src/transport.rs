// The outbound half of a client connection, as seen by the session machine.
//
// The machine never owns a socket directly; it holds something implementing
// `Transport` and hands it one `ClientMessage` at a time. Sends are
// fire-and-forget: a reply, if any, arrives later as an independent
// `ServerMessage`. `masternein_relay::client::NetClient` is the TCP
// implementation; `RecordingTransport` keeps messages in memory for tests and
// offline tools.

use crate::message::ClientMessage;

/// Failure to hand a message to the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound message sink for one connection.
pub trait Transport {
    fn send(&mut self, message: ClientMessage) -> Result<(), TransportError>;
}

/// In-memory transport that records everything sent through it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<ClientMessage>,
    /// When set, every send fails with `NotConnected`.
    pub disconnected: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every message recorded so far.
    pub fn drain(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(message);
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        (**self).send(message)
    }
}
