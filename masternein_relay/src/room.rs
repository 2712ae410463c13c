// Room registry for the relay.
//
// `RoomRegistry` is the central data structure that `server.rs` drives. It
// tracks live connections, the rooms they belong to, and which connection is
// each room's host. All mutation happens through methods called from the
// server's single-threaded main loop, so there is no internal locking.
//
// Key responsibilities:
// - Connection management: add a connection after a valid `hello`, drop it on
//   disconnect, assign no identity of its own (the handshake id is kept).
// - Room lifecycle: a room is created by the first `host` for its code and
//   destroyed when its host leaves. Remaining members get `host-disconnected`
//   and are no longer in any room.
// - Host designation: each room stores a single `host: ConnectionId`, so at
//   most one host exists by construction. `make-player-host` moves it.
// - Forwarding: host-only messages (`host-state`, `set-code`, `ended`,
//   `new-game`, `make-player-host`) are broadcast to the rest of the room;
//   player-only messages (`player-state`, `attempt`) go to the host alone;
//   `update-player` goes to everyone else in the room.
// - Room codes: `generate_room_code` draws 8 characters from the unambiguous
//   alphabet and retries while the code names a live room.
//
// Writing to client streams: each connection holds a cloned `TcpStream`
// write half in a `BufWriter`. Write errors are logged and otherwise ignored;
// the reader thread for that client sees the broken pipe and reports the
// disconnect.
//
// Rejected requests are answered with `ServerMessage::Error` carrying the
// `RelayError` text; the connection stays open.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::BufWriter;
use std::net::{Shutdown, TcpStream};

use masternein_prng::CodeRng;
use masternein_protocol::{
    ClientMessage, Player, PlayerId, ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode, ServerMessage,
    write_frame,
};
use tracing::{debug, info, warn};

use crate::error::RelayError;

/// Relay-assigned handle for one TCP connection. Distinct from the player id:
/// the same player id may connect more than once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Check the handshake's player id. `None` means no `hello` arrived.
pub fn validate_player_id(raw: Option<&str>) -> Result<PlayerId, RelayError> {
    raw.and_then(|raw| PlayerId::parse(raw).ok())
        .ok_or(RelayError::InvalidPlayerId)
}

struct Connection {
    player_id: PlayerId,
    writer: BufWriter<TcpStream>,
    room: Option<RoomCode>,
}

#[derive(Default)]
struct Room {
    members: BTreeSet<ConnectionId>,
    host: Option<ConnectionId>,
}

pub struct RoomRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
    rooms: BTreeMap<RoomCode, Room>,
    rng: CodeRng,
}

impl RoomRegistry {
    pub fn new(rng: CodeRng) -> Self {
        Self {
            connections: BTreeMap::new(),
            rooms: BTreeMap::new(),
            rng,
        }
    }

    /// Track a connection whose handshake succeeded.
    pub fn add_connection(&mut self, conn: ConnectionId, player_id: PlayerId, stream: TcpStream) {
        info!(conn = %conn, player = %player_id, "connected");
        self.connections.insert(
            conn,
            Connection {
                player_id,
                writer: BufWriter::new(stream),
                room: None,
            },
        );
    }

    /// Handle one message from a registered connection, replying with an
    /// `error` frame if it is refused.
    pub fn handle(&mut self, conn: ConnectionId, message: ClientMessage) {
        if !self.connections.contains_key(&conn) {
            return;
        }
        let kind = message_name(&message);
        if let Err(e) = self.dispatch(conn, message) {
            warn!(conn = %conn, message = kind, error = %e, "request refused");
            self.send_to(
                conn,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    fn dispatch(&mut self, conn: ConnectionId, message: ClientMessage) -> Result<(), RelayError> {
        match message {
            ClientMessage::Hello { .. } => Err(RelayError::UnexpectedHello),
            ClientMessage::Host { room_code } => self.on_host(conn, &room_code),
            ClientMessage::Join { room_code, player } => self.on_join(conn, &room_code, player),
            ClientMessage::HostState { state, started } => {
                state.validate()?;
                let code = self.hosted_room(conn, "host-state")?;
                self.broadcast_except(&code, conn, &ServerMessage::HostState { state, started });
                Ok(())
            }
            ClientMessage::PlayerState { rack, colours } => {
                let host = self.room_host_for_player(conn, "player-state")?;
                self.send_to(host, &ServerMessage::PlayerState { rack, colours });
                Ok(())
            }
            ClientMessage::Attempt { rack } => {
                let host = self.room_host_for_player(conn, "attempt")?;
                debug!(conn = %conn, rack = %rack, "attempt");
                self.send_to(host, &ServerMessage::Attempt { rack });
                Ok(())
            }
            ClientMessage::SetCode => {
                let code = self.hosted_room(conn, "set-code")?;
                self.broadcast_except(&code, conn, &ServerMessage::SetCode);
                Ok(())
            }
            ClientMessage::Ended { success } => {
                let code = self.hosted_room(conn, "ended")?;
                self.broadcast_except(&code, conn, &ServerMessage::Ended { success });
                Ok(())
            }
            ClientMessage::NewGame => {
                let code = self.hosted_room(conn, "new-game")?;
                self.broadcast_except(&code, conn, &ServerMessage::NewGame);
                Ok(())
            }
            ClientMessage::UpdatePlayer { player } => self.on_update_player(conn, player),
            ClientMessage::MakePlayerHost { player } => self.on_make_player_host(conn, player),
            // Goodbye is turned into a disconnect by the reader loop.
            ClientMessage::Goodbye => Ok(()),
        }
    }

    /// Claim `raw_code` (or a fresh code if empty) as host and join it.
    pub fn on_host(&mut self, conn: ConnectionId, raw_code: &str) -> Result<(), RelayError> {
        let code = if raw_code.trim().is_empty() {
            self.generate_room_code()
        } else {
            RoomCode::parse(raw_code)?
        };
        if self.rooms.get(&code).is_some_and(|room| room.host != Some(conn)) {
            return Err(RelayError::RoomAlreadyHosted);
        }
        if self.room_code_of(conn) != Some(&code) {
            self.leave_room(conn);
        }

        let room = self.rooms.entry(code.clone()).or_default();
        room.members.insert(conn);
        room.host = Some(conn);
        if let Some(c) = self.connections.get_mut(&conn) {
            c.room = Some(code.clone());
            info!(conn = %conn, player = %c.player_id, room = %code, "hosting");
        }
        self.send_to(
            conn,
            &ServerMessage::InRoom {
                room_code: code.to_string(),
            },
        );
        Ok(())
    }

    /// Join the hosted room `raw_code` as a non-host member. The host is told
    /// about the newcomer and asked to republish its state.
    pub fn on_join(
        &mut self,
        conn: ConnectionId,
        raw_code: &str,
        player: Player,
    ) -> Result<(), RelayError> {
        // A code that does not parse cannot name a live room.
        let code = RoomCode::parse(raw_code).map_err(|_| RelayError::RoomNotFound)?;
        if self.room_code_of(conn) == Some(&code) {
            return Err(RelayError::AlreadyInRoom);
        }
        if !self.rooms.get(&code).is_some_and(|r| r.host.is_some()) {
            return Err(RelayError::RoomNotFound);
        }
        self.leave_room(conn);

        let host = match self.rooms.get_mut(&code) {
            Some(Room {
                members,
                host: Some(host),
            }) => {
                members.insert(conn);
                *host
            }
            // Leaving our previous room cannot close this one.
            _ => return Err(RelayError::RoomNotFound),
        };
        let Some(c) = self.connections.get_mut(&conn) else {
            return Err(RelayError::NotInRoom);
        };
        c.room = Some(code.clone());
        let joined = Player {
            id: c.player_id.clone(),
            display_name: player.display_name,
            host: false,
        };
        info!(conn = %conn, player = %joined.id, room = %code, "joined");

        self.send_to(
            conn,
            &ServerMessage::InRoom {
                room_code: code.to_string(),
            },
        );
        self.send_to(host, &ServerMessage::NewPlayer { player: joined });
        self.send_to(host, &ServerMessage::RequestState);
        Ok(())
    }

    fn on_update_player(&mut self, conn: ConnectionId, player: Player) -> Result<(), RelayError> {
        let code = self.room_code_of(conn).cloned().ok_or(RelayError::NotInRoom)?;
        let Some(c) = self.connections.get(&conn) else {
            return Err(RelayError::NotInRoom);
        };
        let is_host = self.rooms.get(&code).and_then(|r| r.host) == Some(conn);
        let player = Player {
            id: c.player_id.clone(),
            display_name: player.display_name,
            host: is_host,
        };
        self.broadcast_except(&code, conn, &ServerMessage::UpdatePlayer { player });
        Ok(())
    }

    /// Move the host seat from `conn` to the member whose player id matches
    /// `player.id`, then tell the rest of the room.
    fn on_make_player_host(
        &mut self,
        conn: ConnectionId,
        player: Player,
    ) -> Result<(), RelayError> {
        let code = self.hosted_room(conn, "make-player-host")?;
        let target = self
            .rooms
            .get(&code)
            .and_then(|room| {
                room.members.iter().copied().find(|m| {
                    *m != conn
                        && self
                            .connections
                            .get(m)
                            .is_some_and(|c| c.player_id == player.id)
                })
            })
            .ok_or(RelayError::UnknownPlayer)?;
        if let Some(room) = self.rooms.get_mut(&code) {
            room.host = Some(target);
        }
        info!(room = %code, from = %conn, to = %target, "host handed over");
        let promoted = Player {
            host: true,
            ..player
        };
        self.broadcast_except(&code, conn, &ServerMessage::MakePlayerHost { player: promoted });
        Ok(())
    }

    /// Forget `conn`. If it hosted a room, the room is closed and its members
    /// are told; otherwise the host learns the player left.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        self.leave_room(conn);
        if let Some(c) = self.connections.remove(&conn) {
            info!(conn = %conn, player = %c.player_id, "disconnected");
        }
    }

    /// Shut down every connection's socket. Used when the relay stops.
    pub fn close_all(&mut self) {
        for c in self.connections.values() {
            let _ = c.writer.get_ref().shutdown(Shutdown::Both);
        }
        self.connections.clear();
        self.rooms.clear();
    }

    fn leave_room(&mut self, conn: ConnectionId) {
        let Some(c) = self.connections.get_mut(&conn) else {
            return;
        };
        let Some(code) = c.room.take() else {
            return;
        };
        let player_id = c.player_id.clone();
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        room.members.remove(&conn);

        if room.host == Some(conn) {
            let members: Vec<ConnectionId> = room.members.iter().copied().collect();
            self.rooms.remove(&code);
            info!(room = %code, remaining = members.len(), "host left, room closed");
            for member in members {
                if let Some(m) = self.connections.get_mut(&member) {
                    m.room = None;
                }
                self.send_to(member, &ServerMessage::HostDisconnected);
            }
        } else if let Some(host) = room.host {
            debug!(room = %code, player = %player_id, "player left");
            self.send_to(host, &ServerMessage::PlayerLeft { player_id });
        }
    }

    /// Draw a code that names no live room.
    pub fn generate_room_code(&mut self) -> RoomCode {
        let alphabet: Vec<char> = ROOM_CODE_ALPHABET.chars().collect();
        loop {
            let raw: String = (0..ROOM_CODE_LEN)
                .filter_map(|_| self.rng.choose(&alphabet).copied())
                .collect();
            if let Some(code) = RoomCode::parse(&raw)
                .ok()
                .filter(|code| !self.rooms.contains_key(code))
            {
                return code;
            }
        }
    }

    fn room_code_of(&self, conn: ConnectionId) -> Option<&RoomCode> {
        self.connections.get(&conn).and_then(|c| c.room.as_ref())
    }

    /// The room `conn` hosts, or `NotHost`.
    fn hosted_room(&self, conn: ConnectionId, what: &'static str) -> Result<RoomCode, RelayError> {
        let code = self.room_code_of(conn).ok_or(RelayError::NotInRoom)?;
        if self.rooms.get(code).and_then(|r| r.host) == Some(conn) {
            Ok(code.clone())
        } else {
            Err(RelayError::NotHost(what))
        }
    }

    /// The host of the room `conn` plays in, or an error if `conn` is the
    /// host itself.
    fn room_host_for_player(
        &self,
        conn: ConnectionId,
        what: &'static str,
    ) -> Result<ConnectionId, RelayError> {
        let code = self.room_code_of(conn).ok_or(RelayError::NotInRoom)?;
        match self.rooms.get(code).and_then(|r| r.host) {
            Some(host) if host == conn => Err(RelayError::HostCannotSend(what)),
            Some(host) => Ok(host),
            None => Err(RelayError::RoomNotFound),
        }
    }

    /// Returns the number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Player id of `code`'s host, if the room is live.
    pub fn room_host(&self, code: &RoomCode) -> Option<&PlayerId> {
        let host = self.rooms.get(code)?.host?;
        self.connections.get(&host).map(|c| &c.player_id)
    }

    pub fn room_member_count(&self, code: &RoomCode) -> usize {
        self.rooms.get(code).map_or(0, |r| r.members.len())
    }

    /// Send a message to one connection. Write errors are logged only.
    fn send_to(&mut self, conn: ConnectionId, msg: &ServerMessage) {
        let Some(c) = self.connections.get_mut(&conn) else {
            return;
        };
        if let Err(e) = write_frame(&mut c.writer, msg) {
            debug!(conn = %conn, error = %e, "write failed");
        }
    }

    /// Send to every member of `code` except `sender`.
    fn broadcast_except(&mut self, code: &RoomCode, sender: ConnectionId, msg: &ServerMessage) {
        let members: Vec<ConnectionId> = self
            .rooms
            .get(code)
            .map(|r| r.members.iter().copied().filter(|m| *m != sender).collect())
            .unwrap_or_default();
        for member in members {
            self.send_to(member, msg);
        }
    }
}

/// Wire name of a client message, for logs.
fn message_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::Hello { .. } => "hello",
        ClientMessage::Host { .. } => "host",
        ClientMessage::Join { .. } => "join",
        ClientMessage::HostState { .. } => "host-state",
        ClientMessage::PlayerState { .. } => "player-state",
        ClientMessage::SetCode => "set-code",
        ClientMessage::Attempt { .. } => "attempt",
        ClientMessage::Ended { .. } => "ended",
        ClientMessage::NewGame => "new-game",
        ClientMessage::UpdatePlayer { .. } => "update-player",
        ClientMessage::MakePlayerHost { .. } => "make-player-host",
        ClientMessage::Goodbye => "goodbye",
    }
}
