// Per-participant session state machine.
//
// `SessionMachine` owns the current `SessionState`, the `SessionContext`, and
// the outbound `Transport`. Every input (local intent, relay message, identity
// load result) is a `SessionEvent` pushed onto an internal FIFO queue; `send`
// drains the queue one event at a time, running each transition to completion
// before the next is looked at. Events raised by actions (errors, mostly) go
// to the back of the same queue.
//
// A transition is computed by the pure function `transition(state, ctx,
// event)`, a single match keyed by `(state, event)`. Guards are plain
// predicates over the context inside that match. The result is the optional
// target state plus an ordered `Vec<Action>`; the machine moves to the target
// first and then executes the actions against itself. Actions are the only
// code that mutates the context or touches the transport, so outbound
// snapshots (`SendHostState` and friends) always reflect the mutations that
// precede them in the same list.
//
// Events with no entry for the current state are dropped with a debug log.
//
// Host attempt judging is ordered: no secret → raised error; winning guess →
// `host.ended.success`; the guess that would reach `attempt_limit` →
// `host.ended.failure`; otherwise the scored attempt is appended and the new
// host state is broadcast. The winning or final guess is not appended.
//
// See also: `state.rs` for the state enum, `context.rs` for the mutations,
// `event.rs` for relay message mapping, `identity.rs` for the loader.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use masternein_protocol::{
    ClientMessage, Colour, GameState, Palette, Player, PlayerId, Rack, RoomCode, ServerMessage,
    Transport,
};
use tracing::{debug, info, warn};

use crate::context::SessionContext;
use crate::error::{IdentityError, SessionError};
use crate::event::SessionEvent;
use crate::feedback;
use crate::identity::{self, SharedIdentityStore};
use crate::state::{HostPhase, Outcome, SessionState};

/// Shown to players when the room's host goes away.
pub const HOST_LEFT_MESSAGE: &str = "the host left the game";

/// One step of a transition's effect.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SetIdentity {
        player_id: PlayerId,
        display_name: String,
    },
    SetError(String),
    ClearError,
    SetRoom(RoomCode),
    ResetRound,
    ResetSession,
    ClaimHostSeat,
    CaptureSecret,
    IncRack(usize),
    DecRack(usize),
    ReplaceRack(Rack),
    ToggleColour(Colour),
    SetAttemptLimit(u32),
    /// Host mirrors a player's working rack and palette.
    MirrorPlayerState {
        rack: Rack,
        colours: Palette,
    },
    RecordAttempt(Rack),
    ApplyHostState(GameState),
    UpsertPlayer(Player),
    RemovePlayer(PlayerId),
    HandHostTo(Player),
    PromoteSelf,
    SetDisplayName(String),
    PersistDisplayName(String),
    /// Queue a follow-up event.
    Raise(SessionEvent),
    /// Send a message whose payload was fixed when the transition was chosen.
    Send(ClientMessage),
    SendHostState,
    SendPlayerState,
    SendUpdatePlayer,
}

/// The outcome of a matched `(state, event)` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// `None` stays in the current state.
    pub target: Option<SessionState>,
    pub actions: Vec<Action>,
}

fn stay(actions: Vec<Action>) -> Option<Transition> {
    Some(Transition {
        target: None,
        actions,
    })
}

fn go(target: SessionState, actions: Vec<Action>) -> Option<Transition> {
    Some(Transition {
        target: Some(target),
        actions,
    })
}

fn raise(error: SessionError) -> Option<Transition> {
    stay(vec![Action::Raise(SessionEvent::Error {
        message: error.to_string(),
    })])
}

/// The transition table. Pure: reads `ctx`, never mutates it.
pub fn transition(
    state: SessionState,
    ctx: &SessionContext,
    event: SessionEvent,
) -> Option<Transition> {
    use crate::event::SessionEvent as E;
    use crate::state::HostPhase as H;
    use crate::state::PlayerPhase as P;
    use crate::state::SessionState as S;

    match (state, event) {
        // --- Any state ---
        (
            _,
            E::IdentityLoaded {
                player_id,
                display_name,
            },
        ) => stay(vec![Action::SetIdentity {
            player_id,
            display_name,
        }]),
        (_, E::IdentityFailed { message }) => stay(vec![Action::Raise(E::Error { message })]),
        (S::Host(H::Connecting) | S::Player(P::Connecting), E::Error { message }) => go(
            S::Menu,
            vec![Action::ResetSession, Action::SetError(message)],
        ),
        (_, E::Error { message }) => stay(vec![Action::SetError(message)]),
        (_, E::NewDisplayName { display_name }) => {
            let name = display_name.trim();
            if name.is_empty() {
                return None;
            }
            let mut actions = vec![
                Action::SetDisplayName(name.to_string()),
                Action::PersistDisplayName(name.to_string()),
            ];
            if state.in_room() {
                actions.push(Action::SendUpdatePlayer);
            }
            stay(actions)
        }

        // --- Menu ---
        (S::Menu, E::Host { room_code }) => {
            if ctx.player_id.is_none() {
                return raise(SessionError::IdentityPending);
            }
            go(
                S::Host(H::Connecting),
                vec![
                    Action::ClearError,
                    Action::ClaimHostSeat,
                    Action::Send(ClientMessage::Host { room_code }),
                ],
            )
        }
        (S::Menu, E::Join { room_code }) => match ctx.me(false) {
            None => raise(SessionError::IdentityPending),
            Some(player) => go(
                S::Player(P::Connecting),
                vec![
                    Action::ClearError,
                    Action::Send(ClientMessage::Join { room_code, player }),
                ],
            ),
        },

        // --- Host ---
        (S::Host(H::Connecting), E::Connected { room_code }) => {
            go(S::Host(H::Active), vec![Action::SetRoom(room_code)])
        }
        (S::Host(_), E::NewPlayer { player } | E::UpdatePlayer { player }) => {
            stay(vec![Action::UpsertPlayer(player), Action::SendHostState])
        }
        (S::Host(_), E::PlayerLeft { player_id }) => {
            stay(vec![Action::RemovePlayer(player_id), Action::SendHostState])
        }
        (S::Host(_), E::RequestState) => stay(vec![Action::SendHostState]),
        (S::Host(H::Active), E::SetCode) => go(
            S::Host(H::Inactive),
            vec![Action::CaptureSecret, Action::Send(ClientMessage::SetCode)],
        ),
        (S::Host(H::Active), E::IncRack { slot }) => stay(vec![Action::IncRack(slot)]),
        (S::Host(H::Active), E::DecRack { slot }) => stay(vec![Action::DecRack(slot)]),
        (S::Host(H::Active), E::ReplaceRack { rack }) => stay(vec![Action::ReplaceRack(rack)]),
        (S::Host(H::Active), E::ToggleColour { colour }) => {
            if is_last_colour(ctx, colour) {
                return None;
            }
            stay(vec![Action::ToggleColour(colour)])
        }
        (S::Host(H::Active), E::SetAttemptLimit { limit }) if limit >= 1 => stay(vec![
            Action::SetAttemptLimit(limit),
            Action::SendHostState,
        ]),
        (S::Host(H::Inactive), E::PlayerState { rack, colours }) => stay(vec![
            Action::MirrorPlayerState { rack, colours },
            Action::SendHostState,
        ]),
        (S::Host(H::Inactive), E::RemoteAttempt { rack }) => judge_attempt(ctx, rack),
        (S::Host(H::Ended(_)), E::NewGame) => go(
            S::Host(H::Active),
            vec![
                Action::ResetRound,
                Action::Send(ClientMessage::NewGame),
                Action::SendHostState,
            ],
        ),
        (S::Host(H::Ended(outcome)), E::MakePlayerHost { player })
            if !ctx.is_me(&player) && ctx.player_list.iter().any(|p| p.id == player.id) =>
        {
            go(
                S::Player(P::Ended(outcome)),
                vec![
                    Action::HandHostTo(player.clone()),
                    Action::Send(ClientMessage::MakePlayerHost { player }),
                ],
            )
        }

        // --- Player ---
        (S::Player(_), E::HostDisconnected) => go(
            S::Menu,
            vec![
                Action::ResetSession,
                Action::SetError(HOST_LEFT_MESSAGE.to_string()),
            ],
        ),
        (S::Player(P::Connecting), E::Connected { room_code }) => {
            go(S::Player(P::Waiting), vec![Action::SetRoom(room_code)])
        }
        (S::Player(_), E::HostChanged { player }) => stay(vec![Action::HandHostTo(player)]),
        (S::Player(_), E::UpdatePlayer { player }) => stay(vec![Action::UpsertPlayer(player)]),
        (S::Player(P::Waiting | P::Inactive), E::HostState { state, started }) => {
            let target = if started { P::Active } else { P::Inactive };
            go(S::Player(target), vec![Action::ApplyHostState(state)])
        }
        (S::Player(P::Active | P::Ended(_)), E::HostState { state, .. }) => {
            stay(vec![Action::ApplyHostState(state)])
        }
        (S::Player(P::Inactive), E::RemoteSetCode) => go(S::Player(P::Active), Vec::new()),
        (S::Player(P::Active), E::Attempt { rack }) => {
            stay(vec![Action::Send(ClientMessage::Attempt { rack })])
        }
        (S::Player(P::Active), E::IncRack { slot }) => {
            stay(vec![Action::IncRack(slot), Action::SendPlayerState])
        }
        (S::Player(P::Active), E::DecRack { slot }) => {
            stay(vec![Action::DecRack(slot), Action::SendPlayerState])
        }
        (S::Player(P::Active), E::ReplaceRack { rack }) => {
            stay(vec![Action::ReplaceRack(rack), Action::SendPlayerState])
        }
        (S::Player(P::Active), E::ToggleColour { colour }) => {
            if is_last_colour(ctx, colour) {
                return None;
            }
            stay(vec![Action::ToggleColour(colour), Action::SendPlayerState])
        }
        (S::Player(P::Active), E::Ended { success }) => go(
            S::Player(P::Ended(Outcome::from_success(success))),
            Vec::new(),
        ),
        // Promoted before the round ended, or before seeing one at all: the
        // new host starts from an ended round so it can call `new_game`.
        (S::Player(P::Waiting | P::Active | P::Inactive), E::MakeHost) => go(
            S::Host(H::Ended(Outcome::Failure)),
            vec![Action::PromoteSelf],
        ),
        (S::Player(P::Ended(outcome)), E::MakeHost) => {
            go(S::Host(H::Ended(outcome)), vec![Action::PromoteSelf])
        }
        (
            S::Player(P::Waiting | P::Active | P::Inactive | P::Ended(_)),
            E::RemoteNewGame,
        ) => go(S::Player(P::Inactive), vec![Action::ResetRound]),

        _ => None,
    }
}

/// Toggling `colour` off would leave the palette empty.
fn is_last_colour(ctx: &SessionContext, colour: Colour) -> bool {
    ctx.colour_palette.len() == 1 && ctx.colour_palette.contains(colour)
}

fn judge_attempt(ctx: &SessionContext, rack: Rack) -> Option<Transition> {
    let Some(secret) = ctx.secret_code else {
        return raise(SessionError::SecretNotSet);
    };
    if feedback::is_winning_rack(&secret, &rack) {
        return go(
            SessionState::Host(HostPhase::Ended(Outcome::Success)),
            vec![Action::Send(ClientMessage::Ended { success: true })],
        );
    }
    if ctx.attempts.len() + 1 >= ctx.attempt_limit as usize {
        return go(
            SessionState::Host(HostPhase::Ended(Outcome::Failure)),
            vec![Action::Send(ClientMessage::Ended { success: false })],
        );
    }
    stay(vec![Action::RecordAttempt(rack), Action::SendHostState])
}

/// A participant's session: state, context, and the connection it talks
/// through.
pub struct SessionMachine<T: Transport> {
    state: SessionState,
    context: SessionContext,
    transport: T,
    identity: Option<SharedIdentityStore>,
    identity_rx: Option<Receiver<SessionEvent>>,
    queue: VecDeque<SessionEvent>,
}

impl<T: Transport> SessionMachine<T> {
    /// A machine with no identity store. The identity must be fed in as an
    /// `IdentityLoaded` event before hosting or joining.
    pub fn new(transport: T) -> Self {
        Self {
            state: SessionState::Menu,
            context: SessionContext::new(),
            transport,
            identity: None,
            identity_rx: None,
            queue: VecDeque::new(),
        }
    }

    /// A machine whose identity is fetched from `store` in the background.
    /// The result is applied on the first `send`/`poll_identity` after it
    /// arrives.
    pub fn with_identity_store(transport: T, store: SharedIdentityStore) -> Self {
        let rx = identity::spawn_load(store.clone());
        Self {
            identity: Some(store),
            identity_rx: Some(rx),
            ..Self::new(transport)
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Dotted state path, e.g. `"player.waiting"`.
    pub fn value(&self) -> String {
        self.state.value()
    }

    pub fn matches(&self, prefix: &str) -> bool {
        self.state.matches(prefix)
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn display_name(&self) -> &str {
        self.context.display_name()
    }

    /// Take the pending user-facing error, if any.
    pub fn take_error(&mut self) -> Option<String> {
        self.context.error.take()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the background identity load is still outstanding.
    pub fn identity_pending(&self) -> bool {
        self.identity_rx.is_some()
    }

    /// Apply the identity load result if it has arrived. Returns whether
    /// anything was applied.
    pub fn poll_identity(&mut self) -> bool {
        let Some(rx) = &self.identity_rx else {
            return false;
        };
        let event = match rx.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => loader_gone(),
        };
        self.identity_rx = None;
        self.queue.push_back(event);
        self.drain();
        true
    }

    /// Block up to `timeout` for the identity load. Returns whether it
    /// completed (successfully or not).
    pub fn wait_for_identity(&mut self, timeout: Duration) -> bool {
        let Some(rx) = &self.identity_rx else {
            return false;
        };
        let event = match rx.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => loader_gone(),
        };
        self.identity_rx = None;
        self.queue.push_back(event);
        self.drain();
        true
    }

    /// Feed one event and run the queue until it is empty.
    pub fn send(&mut self, event: SessionEvent) {
        self.poll_identity();
        self.queue.push_back(event);
        self.drain();
    }

    /// Feed one relay message.
    pub fn receive(&mut self, message: ServerMessage) {
        let event = SessionEvent::from_server(message, &self.context);
        self.send(event);
    }

    fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            self.step(event);
        }
    }

    fn step(&mut self, event: SessionEvent) {
        let kind = event.kind();
        let from = self.state;
        let Some(Transition { target, actions }) = transition(from, &self.context, event) else {
            debug!(state = %from, event = kind, "event ignored");
            return;
        };
        if let Some(to) = target {
            self.state = to;
            debug!(from = %from, to = %to, event = kind, "transition");
        }
        for action in actions {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::SetIdentity {
                player_id,
                display_name,
            } => {
                debug!(player = %player_id, "identity loaded");
                self.context.player_id = Some(player_id);
                self.context.player_display_name = display_name;
            }
            Action::SetError(message) => {
                warn!(state = %self.state, error = %message, "session error");
                self.context.error = Some(message);
            }
            Action::ClearError => self.context.error = None,
            Action::SetRoom(room_code) => {
                info!(room = %room_code, role = %self.state, "entered room");
                self.context.room_code = Some(room_code);
            }
            Action::ResetRound => self.context.reset_round(),
            Action::ResetSession => self.context.reset_session(),
            Action::ClaimHostSeat => self.context.claim_host_seat(),
            Action::CaptureSecret => self.context.capture_secret(),
            Action::IncRack(slot) => self.context.inc_rack(slot),
            Action::DecRack(slot) => self.context.dec_rack(slot),
            Action::ReplaceRack(rack) => self.context.current_rack = rack,
            Action::ToggleColour(colour) => {
                self.context.colour_palette.toggle(colour);
            }
            Action::SetAttemptLimit(limit) => self.context.attempt_limit = limit,
            Action::MirrorPlayerState { rack, colours } => {
                self.context.current_rack = rack;
                self.context.colour_palette = colours;
            }
            Action::RecordAttempt(rack) => {
                if !self.context.record_attempt(rack) {
                    self.raise_error(SessionError::SecretNotSet);
                }
            }
            Action::ApplyHostState(state) => self.context.apply_host_state(state),
            Action::UpsertPlayer(player) => self.context.upsert_player(player),
            Action::RemovePlayer(id) => self.context.remove_player(&id),
            Action::HandHostTo(player) => self.context.hand_host_to(&player),
            Action::PromoteSelf => self.context.promote_self(),
            Action::SetDisplayName(name) => {
                if let Some(id) = self.context.player_id.clone() {
                    if let Some(entry) = self.context.player_list.iter_mut().find(|p| p.id == id) {
                        entry.display_name = name.clone();
                    }
                }
                self.context.player_display_name = name;
            }
            Action::PersistDisplayName(name) => {
                let result = match &self.identity {
                    Some(store) => match store.lock() {
                        Ok(mut store) => store.set_display_name(&name),
                        Err(_) => Err(IdentityError::Poisoned),
                    },
                    None => Ok(()),
                };
                if let Err(e) = result {
                    self.raise_error(e.into());
                }
            }
            Action::Raise(event) => self.queue.push_back(event),
            Action::Send(message) => self.transmit(message),
            Action::SendHostState => {
                let started = self.context.secret_code.is_some()
                    && self.state == SessionState::Host(HostPhase::Inactive);
                let state = self.context.host_state();
                self.transmit(ClientMessage::HostState { state, started });
            }
            Action::SendPlayerState => {
                let message = ClientMessage::PlayerState {
                    rack: self.context.current_rack,
                    colours: self.context.colour_palette.clone(),
                };
                self.transmit(message);
            }
            Action::SendUpdatePlayer => {
                if let Some(player) = self.context.me(self.state.is_host()) {
                    self.transmit(ClientMessage::UpdatePlayer { player });
                }
            }
        }
    }

    fn transmit(&mut self, message: ClientMessage) {
        if let Err(e) = self.transport.send(message) {
            self.raise_error(e.into());
        }
    }

    fn raise_error(&mut self, error: SessionError) {
        self.queue.push_back(SessionEvent::Error {
            message: error.to_string(),
        });
    }
}

fn loader_gone() -> SessionEvent {
    SessionEvent::IdentityFailed {
        message: SessionError::from(IdentityError::Unavailable("identity loader exited".into()))
            .to_string(),
    }
}
