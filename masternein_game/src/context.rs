// Per-participant session context.
//
// `SessionContext` is the data half of the session machine (the state enum
// in `state.rs` is the other half). It is created once per client process,
// filled in from the identity store when that load completes, and lives
// across rounds. Only the round fields are reset between games:
// - `reset_round()` (on `new_game`): secret, attempts, working rack, palette.
// - `reset_session()` (on role loss: host disconnect, failed connect): the
//   round fields plus room code and player list.
//
// The context never mutates itself in response to events; all mutation is
// driven by `machine.rs` actions calling the methods below.

use masternein_protocol::{Attempt, GameState, Palette, Player, PlayerId, Rack, RoomCode};

use crate::feedback;

/// Attempts allowed per round unless the host changes it.
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 10;

/// Shown when the participant has not picked a display name.
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    /// `None` until the identity store load completes.
    pub player_id: Option<PlayerId>,
    pub player_display_name: String,
    pub room_code: Option<RoomCode>,
    /// Host only. Set by `set_code`, cleared by a round reset.
    pub secret_code: Option<Rack>,
    pub current_rack: Rack,
    pub colour_palette: Palette,
    pub attempts: Vec<Attempt>,
    pub attempt_limit: u32,
    pub player_list: Vec<Player>,
    /// Most recent user-facing error, cleared when a new room is entered.
    pub error: Option<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            player_id: None,
            player_display_name: String::new(),
            room_code: None,
            secret_code: None,
            current_rack: Rack::DEFAULT,
            colour_palette: Palette::full(),
            attempts: Vec::new(),
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            player_list: Vec::new(),
            error: None,
        }
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The display name to show, falling back to `DEFAULT_DISPLAY_NAME`.
    pub fn display_name(&self) -> &str {
        if self.player_display_name.is_empty() {
            DEFAULT_DISPLAY_NAME
        } else {
            &self.player_display_name
        }
    }

    /// This participant as a player-list entry, or `None` before the
    /// identity is known.
    pub fn me(&self, host: bool) -> Option<Player> {
        Some(Player {
            id: self.player_id.clone()?,
            display_name: self.display_name().to_string(),
            host,
        })
    }

    pub fn is_me(&self, player: &Player) -> bool {
        self.player_id.as_ref() == Some(&player.id)
    }

    pub fn reset_round(&mut self) {
        self.secret_code = None;
        self.attempts.clear();
        self.current_rack = Rack::DEFAULT;
        self.colour_palette = Palette::full();
    }

    pub fn reset_session(&mut self) {
        self.reset_round();
        self.room_code = None;
        self.player_list.clear();
    }

    /// Lock the working rack in as the secret and reset the working rack.
    pub fn capture_secret(&mut self) {
        self.secret_code = Some(self.current_rack);
        self.current_rack = Rack::DEFAULT;
    }

    /// Cycle `slot` forward through the palette. Out-of-range slots leave the
    /// rack unchanged.
    pub fn inc_rack(&mut self, slot: usize) {
        if let Some(current) = self.current_rack.get(slot) {
            let next = feedback::next_colour(&self.colour_palette, current);
            if let Some(rack) = self.current_rack.with_slot(slot, next) {
                self.current_rack = rack;
            }
        }
    }

    pub fn dec_rack(&mut self, slot: usize) {
        if let Some(current) = self.current_rack.get(slot) {
            let previous = feedback::previous_colour(&self.colour_palette, current);
            if let Some(rack) = self.current_rack.with_slot(slot, previous) {
                self.current_rack = rack;
            }
        }
    }

    /// Score `guess` against the secret and append it. Returns `false`
    /// without touching the attempts when no secret is set.
    pub fn record_attempt(&mut self, guess: Rack) -> bool {
        let Some(secret) = self.secret_code else {
            return false;
        };
        let fb = feedback::score(&secret, &guess);
        self.attempts.push(Attempt {
            rack: guess,
            single: fb.single,
            double: fb.double,
            index: self.attempts.len(),
        });
        true
    }

    /// Mirror the host's published state into this (player) context.
    pub fn apply_host_state(&mut self, state: GameState) {
        self.current_rack = state.rack;
        self.attempts = state.attempts;
        self.colour_palette = state.colours;
        self.player_list = state.player_list;
        self.attempt_limit = state.attempt_limit;
    }

    /// Snapshot to publish as host. While the secret is still being composed
    /// the working rack *is* the secret, so the default rack goes out instead.
    pub fn host_state(&self) -> GameState {
        GameState {
            rack: if self.secret_code.is_some() {
                self.current_rack
            } else {
                Rack::DEFAULT
            },
            attempts: self.attempts.clone(),
            colours: self.colour_palette.clone(),
            player_list: self.player_list.clone(),
            attempt_limit: self.attempt_limit,
        }
    }

    /// Start a fresh list with only this participant, as host.
    pub fn claim_host_seat(&mut self) {
        self.player_list = self.me(true).into_iter().collect();
    }

    /// Insert `player`, replacing any entry with the same id. The host flag
    /// of an existing entry is kept; a remote update cannot grant itself the
    /// host seat.
    pub fn upsert_player(&mut self, mut player: Player) {
        match self.player_list.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => {
                player.host = existing.host;
                *existing = player;
            }
            None => {
                player.host = false;
                self.player_list.push(player);
            }
        }
    }

    pub fn remove_player(&mut self, id: &PlayerId) {
        self.player_list.retain(|p| &p.id != id);
    }

    /// Move the host flag to `new_host`, adding it if missing. Every other
    /// entry, including this participant's, ends up non-host.
    pub fn hand_host_to(&mut self, new_host: &Player) {
        for p in &mut self.player_list {
            p.host = p.id == new_host.id;
        }
        if !self.player_list.iter().any(|p| p.id == new_host.id) {
            self.player_list.push(Player {
                host: true,
                ..new_host.clone()
            });
        }
    }

    /// This participant takes the host seat.
    pub fn promote_self(&mut self) {
        if let Some(me) = self.me(true) {
            self.hand_host_to(&me);
        }
    }

    pub fn host_count(&self) -> usize {
        self.player_list.iter().filter(|p| p.host).count()
    }
}
