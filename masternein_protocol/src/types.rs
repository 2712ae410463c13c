// Shared value types for the game and the wire protocol.
//
// These are used by `message.rs` (protocol payloads), the session machine in
// `masternein_game`, and the relay's payload validation. Every type here
// enforces its own shape at construction and deserialization time:
// - `Rack` is a fixed `[Colour; 4]`, so a three- or five-slot rack cannot be
//   decoded at all.
// - `Palette` is a non-empty, duplicate-free ordered set of colours.
// - `PlayerId` is a non-empty, trimmed string.
// - `RoomCode` is exactly `ROOM_CODE_LEN` characters from `ROOM_CODE_ALPHABET`,
//   upper-cased.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of slots in a rack.
pub const RACK_LEN: usize = 4;

/// Characters used for room codes. Excludes visually confusable glyphs
/// (0/O, 1/I/L, 5/S, 8/B, ...).
pub const ROOM_CODE_ALPHABET: &str = "ACEFGHKMNPQRTXYZ234679";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 8;

/// One of the nine peg colours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Red,
    Green,
    Blue,
    Orange,
    Gray,
    White,
    Black,
    Pink,
    Purple,
}

impl Colour {
    /// The full palette, in canonical order.
    pub const ALL: [Colour; 9] = [
        Colour::Red,
        Colour::Green,
        Colour::Blue,
        Colour::Orange,
        Colour::Gray,
        Colour::White,
        Colour::Black,
        Colour::Pink,
        Colour::Purple,
    ];

    /// Position in `Colour::ALL`.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Colour::Red => "red",
            Colour::Green => "green",
            Colour::Blue => "blue",
            Colour::Orange => "orange",
            Colour::Gray => "gray",
            Colour::White => "white",
            Colour::Black => "black",
            Colour::Pink => "pink",
            Colour::Purple => "purple",
        }
    }

    /// Display colour as a CSS hex string.
    pub fn hex(self) -> &'static str {
        match self {
            Colour::Red => "#E23C3C",
            Colour::Green => "#00ff00",
            Colour::Blue => "#0099ff",
            Colour::Orange => "#ffa500",
            Colour::Gray => "#808080",
            Colour::White => "#ffffff",
            Colour::Black => "#000000",
            Colour::Pink => "#F98BC4",
            Colour::Purple => "#8A4FBA",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing an unknown colour name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown colour: {0}")]
pub struct UnknownColour(pub String);

impl FromStr for Colour {
    type Err = UnknownColour;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Colour::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| UnknownColour(s.to_string()))
    }
}

/// A four-slot row of colours: either the secret code or a guess.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rack(pub [Colour; RACK_LEN]);

impl Rack {
    /// The rack a fresh round starts from: the first four palette colours.
    pub const DEFAULT: Rack = Rack([Colour::Red, Colour::Green, Colour::Blue, Colour::Orange]);

    pub fn new(slots: [Colour; RACK_LEN]) -> Self {
        Self(slots)
    }

    pub fn slots(&self) -> &[Colour; RACK_LEN] {
        &self.0
    }

    pub fn get(&self, slot: usize) -> Option<Colour> {
        self.0.get(slot).copied()
    }

    /// Copy of this rack with `slot` replaced, or `None` if `slot` is out of
    /// range.
    pub fn with_slot(&self, slot: usize, colour: Colour) -> Option<Rack> {
        let mut slots = self.0;
        *slots.get_mut(slot)? = colour;
        Some(Rack(slots))
    }

    pub fn iter(&self) -> impl Iterator<Item = Colour> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Rack {
    fn default() -> Self {
        Rack::DEFAULT
    }
}

impl fmt::Display for Rack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "[{a},{b},{c},{d}]")
    }
}

/// The colours a participant cycles through when editing a rack.
///
/// Insertion-ordered, no duplicates, never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Colour>", into = "Vec<Colour>")]
pub struct Palette(Vec<Colour>);

/// Returned when decoding a palette that would break its invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("palette must contain at least one colour")]
    Empty,
    #[error("palette lists {0} more than once")]
    Duplicate(Colour),
}

impl Palette {
    /// All nine colours in canonical order.
    pub fn full() -> Self {
        Self(Colour::ALL.to_vec())
    }

    pub fn colours(&self) -> &[Colour] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, colour: Colour) -> bool {
        self.0.contains(&colour)
    }

    pub fn first(&self) -> Colour {
        self.0[0]
    }

    pub fn last(&self) -> Colour {
        self.0[self.0.len() - 1]
    }

    /// Remove `colour` if present, otherwise append it. Refuses to remove the
    /// last remaining colour. Returns whether the palette changed.
    pub fn toggle(&mut self, colour: Colour) -> bool {
        match self.0.iter().position(|c| *c == colour) {
            Some(_) if self.0.len() == 1 => false,
            Some(pos) => {
                self.0.remove(pos);
                true
            }
            None => {
                self.0.push(colour);
                true
            }
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::full()
    }
}

impl TryFrom<Vec<Colour>> for Palette {
    type Error = PaletteError;

    fn try_from(colours: Vec<Colour>) -> Result<Self, Self::Error> {
        if colours.is_empty() {
            return Err(PaletteError::Empty);
        }
        for (i, c) in colours.iter().enumerate() {
            if colours[..i].contains(c) {
                return Err(PaletteError::Duplicate(*c));
            }
        }
        Ok(Self(colours))
    }
}

impl From<Palette> for Vec<Colour> {
    fn from(palette: Palette) -> Self {
        palette.0
    }
}

/// A scored guess. `index` is its 0-based position in the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub rack: Rack,
    pub single: u8,
    pub double: u8,
    pub index: usize,
}

/// Stable per-device identifier presented in the connection handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

/// Returned for an empty or whitespace-only player id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("player id is required")]
pub struct EmptyPlayerId;

impl PlayerId {
    pub fn parse(raw: &str) -> Result<Self, EmptyPlayerId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyPlayerId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = EmptyPlayerId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        PlayerId::parse(&raw)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participant as shown in the room's player list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub host: bool,
}

/// A validated room code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

/// Returned for a room code with the wrong length or characters.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid room code: {0:?}")]
pub struct InvalidRoomCode(pub String);

impl RoomCode {
    /// Parse user input: surrounding whitespace is dropped and letters are
    /// upper-cased before checking length and alphabet.
    pub fn parse(raw: &str) -> Result<Self, InvalidRoomCode> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.chars().count() == ROOM_CODE_LEN
            && code.chars().all(|c| ROOM_CODE_ALPHABET.contains(c));
        if !valid {
            return Err(InvalidRoomCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InvalidRoomCode;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&raw)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
