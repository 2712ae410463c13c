// Events consumed by the session machine.
//
// One enum covers all three sources:
// - identity load results (`IdentityLoaded` / `IdentityFailed`), fed in once
//   by the background loader in `identity.rs`;
// - local intents from the presentation layer (`Host`, `Join`, `SetCode`,
//   `IncRack`, ...);
// - relay messages, converted by `from_server`.
//
// A relay message that echoes a local intent from the other side of the
// room gets its own kind (`RemoteSetCode`, `RemoteAttempt`, `RemoteNewGame`,
// `HostChanged`), so the transition table never mistakes a participant's own
// button press for something the host or a player sent.

use masternein_protocol::{
    Colour, GameState, Palette, Player, PlayerId, Rack, RoomCode, ServerMessage,
};

use crate::context::SessionContext;
use crate::error::SessionError;

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    IdentityLoaded {
        player_id: PlayerId,
        display_name: String,
    },
    IdentityFailed {
        message: String,
    },

    Host {
        room_code: String,
    },
    Join {
        room_code: String,
    },
    SetCode,
    Attempt {
        rack: Rack,
    },
    IncRack {
        slot: usize,
    },
    DecRack {
        slot: usize,
    },
    ReplaceRack {
        rack: Rack,
    },
    ToggleColour {
        colour: Colour,
    },
    NewDisplayName {
        display_name: String,
    },
    SetAttemptLimit {
        limit: u32,
    },
    NewGame,
    /// Host hands over the host seat to `player`.
    MakePlayerHost {
        player: Player,
    },
    /// This participant has been given the host seat.
    MakeHost,

    Connected {
        room_code: RoomCode,
    },
    HostState {
        state: GameState,
        started: bool,
    },
    PlayerState {
        rack: Rack,
        colours: Palette,
    },
    RequestState,
    NewPlayer {
        player: Player,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    UpdatePlayer {
        player: Player,
    },
    /// The host locked in a secret; guessing may start.
    RemoteSetCode,
    /// A player's guess, for this host to judge.
    RemoteAttempt {
        rack: Rack,
    },
    /// The host started a fresh round.
    RemoteNewGame,
    /// Someone else now holds the host seat.
    HostChanged {
        player: Player,
    },
    Ended {
        success: bool,
    },
    HostDisconnected,
    Error {
        message: String,
    },
}

impl SessionEvent {
    /// Short snake_case name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::IdentityLoaded { .. } => "identity_loaded",
            SessionEvent::IdentityFailed { .. } => "identity_failed",
            SessionEvent::Host { .. } => "host",
            SessionEvent::Join { .. } => "join",
            SessionEvent::SetCode => "set_code",
            SessionEvent::Attempt { .. } => "attempt",
            SessionEvent::IncRack { .. } => "inc_rack",
            SessionEvent::DecRack { .. } => "dec_rack",
            SessionEvent::ReplaceRack { .. } => "replace_rack",
            SessionEvent::ToggleColour { .. } => "toggle_colour",
            SessionEvent::NewDisplayName { .. } => "new_display_name",
            SessionEvent::SetAttemptLimit { .. } => "set_attempt_limit",
            SessionEvent::NewGame => "new_game",
            SessionEvent::MakePlayerHost { .. } => "make_player_host",
            SessionEvent::MakeHost => "make_host",
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::HostState { .. } => "host_state",
            SessionEvent::PlayerState { .. } => "player_state",
            SessionEvent::RequestState => "request_state",
            SessionEvent::NewPlayer { .. } => "new_player",
            SessionEvent::PlayerLeft { .. } => "player_left",
            SessionEvent::UpdatePlayer { .. } => "update_player",
            SessionEvent::RemoteSetCode => "remote_set_code",
            SessionEvent::RemoteAttempt { .. } => "remote_attempt",
            SessionEvent::RemoteNewGame => "remote_new_game",
            SessionEvent::HostChanged { .. } => "host_changed",
            SessionEvent::Ended { .. } => "ended",
            SessionEvent::HostDisconnected => "host_disconnected",
            SessionEvent::Error { .. } => "error",
        }
    }

    /// Translate a relay message into the event it drives. A
    /// `make-player-host` naming this participant becomes `MakeHost`; one
    /// naming anyone else becomes `HostChanged`.
    pub fn from_server(msg: ServerMessage, ctx: &SessionContext) -> SessionEvent {
        match msg {
            ServerMessage::InRoom { room_code } => match RoomCode::parse(&room_code) {
                Ok(room_code) => SessionEvent::Connected { room_code },
                Err(e) => SessionEvent::Error {
                    message: e.to_string(),
                },
            },
            ServerMessage::RequestState => SessionEvent::RequestState,
            ServerMessage::NewPlayer { player } => SessionEvent::NewPlayer { player },
            ServerMessage::PlayerLeft { player_id } => SessionEvent::PlayerLeft { player_id },
            ServerMessage::HostState { state, started } => {
                SessionEvent::HostState { state, started }
            }
            ServerMessage::PlayerState { rack, colours } => {
                SessionEvent::PlayerState { rack, colours }
            }
            ServerMessage::SetCode => SessionEvent::RemoteSetCode,
            ServerMessage::Attempt { rack } => SessionEvent::RemoteAttempt { rack },
            ServerMessage::Ended { success } => SessionEvent::Ended { success },
            ServerMessage::NewGame => SessionEvent::RemoteNewGame,
            ServerMessage::UpdatePlayer { player } => SessionEvent::UpdatePlayer { player },
            ServerMessage::MakePlayerHost { player } if ctx.is_me(&player) => {
                SessionEvent::MakeHost
            }
            ServerMessage::MakePlayerHost { player } => SessionEvent::HostChanged { player },
            ServerMessage::HostDisconnected => SessionEvent::HostDisconnected,
            ServerMessage::Error { message } => SessionEvent::Error {
                message: SessionError::Relay(message).to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> Player {
        Player {
            id: PlayerId::parse(id).unwrap(),
            display_name: id.into(),
            host: true,
        }
    }

    #[test]
    fn make_player_host_for_me_becomes_make_host() {
        let ctx = SessionContext {
            player_id: Some(PlayerId::parse("me").unwrap()),
            ..SessionContext::default()
        };
        let ev = SessionEvent::from_server(
            ServerMessage::MakePlayerHost {
                player: player("me"),
            },
            &ctx,
        );
        assert_eq!(ev, SessionEvent::MakeHost);

        let ev = SessionEvent::from_server(
            ServerMessage::MakePlayerHost {
                player: player("other"),
            },
            &ctx,
        );
        assert_eq!(ev.kind(), "host_changed");
    }

    #[test]
    fn echoed_intents_get_remote_kinds() {
        let ctx = SessionContext::default();
        let rack = Rack::DEFAULT;
        assert_eq!(
            SessionEvent::from_server(ServerMessage::SetCode, &ctx),
            SessionEvent::RemoteSetCode
        );
        assert_eq!(
            SessionEvent::from_server(ServerMessage::Attempt { rack }, &ctx),
            SessionEvent::RemoteAttempt { rack }
        );
        assert_eq!(
            SessionEvent::from_server(ServerMessage::NewGame, &ctx),
            SessionEvent::RemoteNewGame
        );
    }

    #[test]
    fn in_room_with_bad_code_becomes_error() {
        let ctx = SessionContext::default();
        let ev = SessionEvent::from_server(
            ServerMessage::InRoom {
                room_code: "nope".into(),
            },
            &ctx,
        );
        assert_eq!(ev.kind(), "error");

        let ev = SessionEvent::from_server(
            ServerMessage::InRoom {
                room_code: "acefgh23".into(),
            },
            &ctx,
        );
        assert_eq!(
            ev,
            SessionEvent::Connected {
                room_code: RoomCode::parse("ACEFGH23").unwrap()
            }
        );
    }
}
