// TCP server and main event loop for the relay.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per client): read the `hello` frame under the
//   handshake timeout and report it as `InternalEvent::Handshake`, then read
//   `ClientMessage` frames in a loop and send `InternalEvent::MessageFrom`.
//   On `goodbye`, EOF, or a malformed frame, send `InternalEvent::Disconnected`
//   and exit.
// - **Main thread**: owns the `RoomRegistry`, receives events from the
//   channel, and dispatches them one at a time. Uses `recv_timeout` so it can
//   notice `keep_running` going false even when the relay is idle.
//
// The handshake runs on the reader thread, so a client that connects and
// says nothing delays only itself. Events from one reader arrive in order,
// so a connection's `Handshake` is always handled before its first message.
// A connection whose handshake fails gets an `error` frame and is shut down;
// its reader then fails and reports a disconnect for a connection the
// registry never added, which is a no-op.
//
// The main thread is the only writer to client TCP streams (via
// `RoomRegistry`). Reader threads only read.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`; the main loop exits,
// shuts down every client socket, and returns.

use std::io::{BufReader, BufWriter};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use masternein_prng::CodeRng;
use masternein_protocol::{ClientMessage, ServerMessage, read_frame, write_frame};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::room::{ConnectionId, RoomRegistry, validate_player_id};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 39373;

/// How often the idle main loop checks `keep_running`.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    /// `player_id` is `None` if the first frame was missing or not a `hello`.
    Handshake {
        conn: ConnectionId,
        player_id: Option<String>,
        stream: TcpStream,
    },
    MessageFrom {
        conn: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the relay exits.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a relay server.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_address: IpAddr,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    /// How long a new connection has to send its `hello`.
    pub handshake_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Start the relay server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_relay(config: RelayConfig) -> std::io::Result<(RelayHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_address, config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_relay(listener, config, keep_running_clone);
    });

    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(listener: TcpListener, config: RelayConfig, keep_running: Arc<AtomicBool>) {
    let mut registry = RoomRegistry::new(CodeRng::from_entropy());
    let mut next_conn = 0u64;

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Non-blocking so the accept thread can check keep_running periodically.
    if let Err(e) = listener.set_nonblocking(true) {
        warn!(error = %e, "listener cannot be made non-blocking");
    }

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted");
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, listener exiting");
                    break;
                }
            }
        }
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(event) => {
                handle_event(&mut registry, event, &mut next_conn, &tx, &config, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut registry, event, &mut next_conn, &tx, &config, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(connections = registry.connection_count(), "relay stopping");
    registry.close_all();
}

/// Dispatch a single event to the registry.
fn handle_event(
    registry: &mut RoomRegistry,
    event: InternalEvent,
    next_conn: &mut u64,
    tx: &Sender<InternalEvent>,
    config: &RelayConfig,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            let conn = ConnectionId(*next_conn);
            *next_conn += 1;
            let tx_reader = tx.clone();
            let keep_running_reader = keep_running.clone();
            let timeout = config.handshake_timeout;
            thread::spawn(move || {
                reader_loop(stream, conn, timeout, tx_reader, keep_running_reader);
            });
        }
        InternalEvent::Handshake {
            conn,
            player_id,
            stream,
        } => match validate_player_id(player_id.as_deref()) {
            Ok(player_id) => registry.add_connection(conn, player_id, stream),
            Err(e) => reject(conn, stream, &e),
        },
        InternalEvent::MessageFrom { conn, message } => registry.handle(conn, message),
        InternalEvent::Disconnected { conn } => registry.disconnect(conn),
    }
}

/// Reply with an `error` frame and close the connection.
fn reject(conn: ConnectionId, stream: TcpStream, reason: &RelayError) {
    warn!(conn = %conn, reason = %reason, "handshake rejected");
    let mut writer = BufWriter::new(stream);
    let _ = write_frame(
        &mut writer,
        &ServerMessage::Error {
            message: reason.to_string(),
        },
    );
    let _ = writer.get_ref().shutdown(Shutdown::Both);
}

/// Reader loop for a single client. Runs in its own thread.
fn reader_loop(
    stream: TcpStream,
    conn: ConnectionId,
    handshake_timeout: Duration,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(conn = %conn, error = %e, "cannot clone stream");
            return;
        }
    };
    stream.set_read_timeout(Some(handshake_timeout)).ok();
    let mut reader = BufReader::new(stream);

    let player_id = match read_frame::<_, ClientMessage>(&mut reader) {
        Ok(ClientMessage::Hello { player_id }) => Some(player_id),
        Ok(_) => None,
        Err(e) => {
            debug!(conn = %conn, error = %e, "no hello");
            None
        }
    };
    let greeted = player_id.is_some();
    let _ = tx.send(InternalEvent::Handshake {
        conn,
        player_id,
        stream: write_half,
    });
    if !greeted {
        return;
    }
    // Clear the handshake timeout for the long-lived loop.
    reader.get_ref().set_read_timeout(None).ok();

    while keep_running.load(Ordering::SeqCst) {
        match read_frame::<_, ClientMessage>(&mut reader) {
            Ok(ClientMessage::Goodbye) => break,
            Ok(message) => {
                let _ = tx.send(InternalEvent::MessageFrom { conn, message });
            }
            Err(e) => {
                if !e.is_eof() {
                    debug!(conn = %conn, error = %e, "read failed");
                }
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { conn });
}
