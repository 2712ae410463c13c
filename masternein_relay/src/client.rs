// TCP client for connecting to the relay.
//
// Provides a non-blocking interface for a participant's main thread:
// - `connect()` performs the TCP connect and sends the `hello` frame on the
//   calling thread, then spawns a background reader thread. The relay sends
//   nothing back for a good `hello`; a bad one comes back as an `error`
//   message followed by EOF, which `poll()` surfaces like any other message.
// - The reader thread reads framed `ServerMessage`s in a loop and pushes them
//   into an `mpsc` channel.
// - The main thread holds a `BufWriter<TcpStream>` for sending; each frame is
//   flushed as it is written.
// - `poll()` drains the inbox non-blocking.
//
// `NetClient` implements `masternein_protocol::Transport`, so a
// `SessionMachine<NetClient>` sends through it directly. The machine never
// waits on a reply: the caller feeds whatever `poll()` returns back into
// `SessionMachine::receive`.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use masternein_protocol::{
    ClientMessage, FrameError, ServerMessage, Transport, TransportError, read_frame, write_frame,
};
use tracing::debug;

/// Failure to establish a relay connection.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("send hello failed: {0}")]
    Hello(#[source] FrameError),
}

/// TCP client for relay communication.
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl NetClient {
    /// Connect to a relay, send `hello { player_id }`, and spawn a reader
    /// thread.
    pub fn connect(addr: impl ToSocketAddrs, player_id: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        let reader_stream = stream.try_clone()?;
        let mut writer = BufWriter::new(stream);

        write_frame(
            &mut writer,
            &ClientMessage::Hello {
                player_id: player_id.to_string(),
            },
        )
        .map_err(ClientError::Hello)?;

        let (tx, rx) = mpsc::channel();
        let reader = BufReader::new(reader_stream);
        let reader_thread = thread::spawn(move || {
            reader_loop(reader, tx);
        });

        Ok(Self {
            writer,
            inbox: rx,
            _reader_thread: Some(reader_thread),
            closed: false,
        })
    }

    /// Send one message to the relay.
    pub fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotConnected);
        }
        write_frame(&mut self.writer, message).map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Send `goodbye` and close the connection.
    pub fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        let _ = write_frame(&mut self.writer, &ClientMessage::Goodbye);
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        self.closed = true;
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

impl Transport for NetClient {
    fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        NetClient::send(self, &message)
    }
}

/// Reader thread: read framed messages in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: Sender<ServerMessage>) {
    loop {
        match read_frame::<_, ServerMessage>(&mut reader) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break; // Owner dropped the receiver.
                }
            }
            Err(e) => {
                if !e.is_eof() {
                    debug!(error = %e, "relay connection read failed");
                }
                break;
            }
        }
    }
}
