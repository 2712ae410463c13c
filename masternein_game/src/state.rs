// Session state as a tagged union.
//
// Exactly one leaf is active at a time. The hierarchy is encoded by nesting:
//
//   menu
//   host.{connecting, active, inactive, ended.{success, failure}}
//   player.{connecting, waiting, active, inactive, ended.{success, failure}}
//
// `value()` renders the dotted path the presentation layer keys off, and
// `matches(prefix)` answers "is the machine anywhere under `host`?" style
// questions without the caller matching on the enum.

use std::fmt;

/// How a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostPhase {
    /// Waiting for the relay's `in-room`.
    Connecting,
    /// Composing the secret code.
    Active,
    /// Secret set; judging guesses.
    Inactive,
    Ended(Outcome),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerPhase {
    /// Waiting for the relay's `in-room`.
    Connecting,
    /// In the room, waiting for the host's first state.
    Waiting,
    /// Guessing.
    Active,
    /// Waiting for the host to set a code.
    Inactive,
    Ended(Outcome),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Menu,
    Host(HostPhase),
    Player(PlayerPhase),
}

impl SessionState {
    /// Dotted state path, e.g. `"host.ended.success"`.
    pub fn value(&self) -> String {
        match self {
            SessionState::Menu => "menu".into(),
            SessionState::Host(phase) => match phase {
                HostPhase::Connecting => "host.connecting".into(),
                HostPhase::Active => "host.active".into(),
                HostPhase::Inactive => "host.inactive".into(),
                HostPhase::Ended(o) => format!("host.ended.{}", o.as_str()),
            },
            SessionState::Player(phase) => match phase {
                PlayerPhase::Connecting => "player.connecting".into(),
                PlayerPhase::Waiting => "player.waiting".into(),
                PlayerPhase::Active => "player.active".into(),
                PlayerPhase::Inactive => "player.inactive".into(),
                PlayerPhase::Ended(o) => format!("player.ended.{}", o.as_str()),
            },
        }
    }

    /// True if `prefix` names this state or one of its ancestors.
    pub fn matches(&self, prefix: &str) -> bool {
        let value = self.value();
        value == prefix
            || value
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    pub fn is_host(&self) -> bool {
        matches!(self, SessionState::Host(_))
    }

    pub fn is_player(&self) -> bool {
        matches!(self, SessionState::Player(_))
    }

    /// Holding a role and past the connecting phase.
    pub fn in_room(&self) -> bool {
        !matches!(
            self,
            SessionState::Menu
                | SessionState::Host(HostPhase::Connecting)
                | SessionState::Player(PlayerPhase::Connecting)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_dotted_paths() {
        assert_eq!(SessionState::Menu.value(), "menu");
        assert_eq!(
            SessionState::Host(HostPhase::Ended(Outcome::Success)).value(),
            "host.ended.success"
        );
        assert_eq!(
            SessionState::Player(PlayerPhase::Waiting).to_string(),
            "player.waiting"
        );
    }

    #[test]
    fn matches_ancestors_only_on_segment_boundaries() {
        let s = SessionState::Player(PlayerPhase::Ended(Outcome::Failure));
        assert!(s.matches("player"));
        assert!(s.matches("player.ended"));
        assert!(s.matches("player.ended.failure"));
        assert!(!s.matches("player.end"));
        assert!(!s.matches("host"));
    }

    #[test]
    fn in_room_excludes_menu_and_connecting() {
        assert!(!SessionState::Menu.in_room());
        assert!(!SessionState::Host(HostPhase::Connecting).in_room());
        assert!(SessionState::Host(HostPhase::Active).in_room());
        assert!(SessionState::Player(PlayerPhase::Waiting).in_room());
    }

    #[test]
    fn role_predicates() {
        let host = SessionState::Host(HostPhase::Inactive);
        let player = SessionState::Player(PlayerPhase::Ended(Outcome::Success));
        assert!(host.is_host() && !host.is_player());
        assert!(player.is_player() && !player.is_host());
        assert!(!SessionState::Menu.is_host() && !SessionState::Menu.is_player());
    }
}
