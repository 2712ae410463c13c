// Protocol messages for client-relay communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game clients to the relay.
// - `ServerMessage`: sent by the relay to game clients, either generated by
//   the relay itself (`in-room`, `request-state`, `host-disconnected`,
//   `error`, ...) or forwarded unchanged from another room member.
//
// Message names are kebab-case on the wire (`"set-code"`,
// `{"host-state": {...}}`) and payload fields are camelCase, so a captured
// frame reads the same as the protocol table in the docs.
//
// `GameState` is the host's full published state. It is the only payload
// whose consistency the relay checks beyond what the types already enforce;
// see `GameState::validate`.

use serde::{Deserialize, Serialize};

use crate::types::{Attempt, Palette, Player, PlayerId, Rack};

/// Messages sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Connection handshake. Must be the first frame on every connection.
    Hello { player_id: String },
    /// Claim (or create, when `room_code` is empty) a room as its host.
    Host { room_code: String },
    /// Join an existing room as a non-host player.
    Join { room_code: String, player: Player },
    /// Host's full state, broadcast to the rest of the room.
    HostState {
        #[serde(flatten)]
        state: GameState,
        #[serde(default)]
        started: bool,
    },
    /// A player's working rack and palette, sent to the host.
    PlayerState { rack: Rack, colours: Palette },
    /// Host has locked in the secret code.
    SetCode,
    /// A player's guess, judged by the host.
    Attempt { rack: Rack },
    /// The round is over.
    Ended { success: bool },
    /// Host started a fresh round.
    NewGame,
    /// A participant changed their display name.
    UpdatePlayer { player: Player },
    /// Host hands the host seat to `player`.
    MakePlayerHost { player: Player },
    /// Leaving gracefully.
    Goodbye,
}

/// Messages sent by the relay to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The sender is now a member of `room_code`.
    InRoom { room_code: String },
    /// Sent to the host when someone joins; the host should republish.
    RequestState,
    /// Sent to the host ahead of `request-state` with the joiner's identity.
    NewPlayer { player: Player },
    /// Sent to the host when a non-host member disconnects.
    PlayerLeft { player_id: PlayerId },
    HostState {
        #[serde(flatten)]
        state: GameState,
        #[serde(default)]
        started: bool,
    },
    PlayerState { rack: Rack, colours: Palette },
    SetCode,
    Attempt { rack: Rack },
    Ended { success: bool },
    NewGame,
    UpdatePlayer { player: Player },
    MakePlayerHost { player: Player },
    /// The room's host went away; the round is over.
    HostDisconnected,
    /// A request could not be served.
    Error { message: String },
}

/// The host's authoritative game state as published to players.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub rack: Rack,
    pub attempts: Vec<Attempt>,
    pub colours: Palette,
    pub player_list: Vec<Player>,
    pub attempt_limit: u32,
}

/// Why a `GameState` was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidGameState {
    #[error("attempt limit must be at least 1")]
    ZeroAttemptLimit,
    #[error("{count} attempts exceed the limit of {limit}")]
    TooManyAttempts { count: usize, limit: u32 },
    #[error("attempt at position {position} carries index {index}")]
    OutOfOrderAttempt { position: usize, index: usize },
    #[error("attempt {index} scores more than four pegs")]
    ImpossibleScore { index: usize },
    #[error("player list names {0} hosts")]
    MultipleHosts(usize),
}

impl GameState {
    /// Check the cross-field invariants the types alone cannot express.
    pub fn validate(&self) -> Result<(), InvalidGameState> {
        if self.attempt_limit == 0 {
            return Err(InvalidGameState::ZeroAttemptLimit);
        }
        if self.attempts.len() > self.attempt_limit as usize {
            return Err(InvalidGameState::TooManyAttempts {
                count: self.attempts.len(),
                limit: self.attempt_limit,
            });
        }
        for (position, attempt) in self.attempts.iter().enumerate() {
            if attempt.index != position {
                return Err(InvalidGameState::OutOfOrderAttempt {
                    position,
                    index: attempt.index,
                });
            }
            if usize::from(attempt.single) + usize::from(attempt.double) > crate::types::RACK_LEN {
                return Err(InvalidGameState::ImpossibleScore {
                    index: attempt.index,
                });
            }
        }
        let hosts = self.player_list.iter().filter(|p| p.host).count();
        if hosts > 1 {
            return Err(InvalidGameState::MultipleHosts(hosts));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Colour;

    fn player(id: &str, host: bool) -> Player {
        Player {
            id: PlayerId::parse(id).unwrap(),
            display_name: id.to_uppercase(),
            host,
        }
    }

    fn state() -> GameState {
        GameState {
            rack: Rack::DEFAULT,
            attempts: vec![Attempt {
                rack: Rack::new([Colour::Red; 4]),
                single: 0,
                double: 1,
                index: 0,
            }],
            colours: Palette::full(),
            player_list: vec![player("h", true), player("p", false)],
            attempt_limit: 10,
        }
    }

    #[test]
    fn unit_messages_use_kebab_case_names() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::SetCode).unwrap(),
            r#""set-code""#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::HostDisconnected).unwrap(),
            r#""host-disconnected""#
        );
    }

    #[test]
    fn payload_fields_use_camel_case() {
        let json = serde_json::to_value(ClientMessage::Host {
            room_code: String::new(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "host": { "roomCode": "" } }));
    }

    #[test]
    fn host_state_is_flattened_with_started_flag() {
        let msg = ServerMessage::HostState {
            state: state(),
            started: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        let body = &json["host-state"];
        assert_eq!(body["started"], true);
        assert_eq!(body["attemptLimit"], 10);
        assert_eq!(body["playerList"][0]["displayName"], "H");
        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn started_defaults_to_false() {
        let mut json = serde_json::to_value(ClientMessage::HostState {
            state: state(),
            started: true,
        })
        .unwrap();
        json["host-state"]
            .as_object_mut()
            .unwrap()
            .remove("started");
        match serde_json::from_value::<ClientMessage>(json).unwrap() {
            ClientMessage::HostState { started, .. } => assert!(!started),
            other => panic!("expected HostState, got {other:?}"),
        }
    }

    #[test]
    fn malformed_rack_in_attempt_is_rejected() {
        let raw = r#"{"attempt":{"rack":["red","red","red"]}}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn validate_accepts_consistent_state() {
        assert_eq!(state().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_broken_states() {
        let mut s = state();
        s.attempt_limit = 0;
        assert_eq!(s.validate(), Err(InvalidGameState::ZeroAttemptLimit));

        let mut s = state();
        s.attempt_limit = 1;
        s.attempts.push(s.attempts[0]);
        assert!(matches!(
            s.validate(),
            Err(InvalidGameState::TooManyAttempts { count: 2, limit: 1 })
        ));

        let mut s = state();
        s.attempts[0].index = 3;
        assert!(matches!(
            s.validate(),
            Err(InvalidGameState::OutOfOrderAttempt { position: 0, index: 3 })
        ));

        let mut s = state();
        s.attempts[0].single = 4;
        assert!(matches!(
            s.validate(),
            Err(InvalidGameState::ImpossibleScore { index: 0 })
        ));

        let mut s = state();
        s.player_list[1].host = true;
        assert_eq!(s.validate(), Err(InvalidGameState::MultipleHosts(2)));
    }
}
