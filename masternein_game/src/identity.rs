// Identity store: the participant's stable player id and display name.
//
// `IdentityStore` is the seam; two implementations live here:
// - `FileIdentityStore`: a small JSON document (`{"playerId": ...,
//   "playerDisplayName": ...}`) on local disk. A missing file or missing id
//   is not an error: a fresh UUID v4 is generated and written back.
// - `MemoryIdentityStore`: for tests, with optional failure injection.
//
// The session machine does not block on the store at startup. `spawn_load`
// runs the fetch on a background thread and hands back a receiver that
// yields exactly one `SessionEvent` (`IdentityLoaded` or `IdentityFailed`),
// which the machine applies as a single update whenever it arrives.
//
// See also: `machine.rs` (`SessionMachine::with_identity_store`,
// `poll_identity`) for the consuming side.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use masternein_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::DEFAULT_DISPLAY_NAME;
use crate::error::{IdentityError, SessionError};
use crate::event::SessionEvent;

/// Durable per-device identity.
pub trait IdentityStore {
    /// The stored player id, created and persisted on first use.
    fn player_id(&mut self) -> Result<PlayerId, IdentityError>;
    /// The stored display name, or `DEFAULT_DISPLAY_NAME` if none was saved.
    fn display_name(&mut self) -> Result<String, IdentityError>;
    fn set_display_name(&mut self, name: &str) -> Result<(), IdentityError>;
}

/// An identity store shared between the machine and its loader thread.
pub type SharedIdentityStore = Arc<Mutex<dyn IdentityStore + Send>>;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    player_display_name: Option<String>,
}

/// JSON-file-backed identity store.
#[derive(Clone, Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredIdentity, IdentityError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoredIdentity::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, stored: &StoredIdentity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(stored)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn player_id(&mut self) -> Result<PlayerId, IdentityError> {
        let mut stored = self.load()?;
        if let Some(id) = stored.player_id.as_deref().and_then(|raw| PlayerId::parse(raw).ok()) {
            return Ok(id);
        }
        let fresh = uuid::Uuid::new_v4().to_string();
        debug!(path = %self.path.display(), "generated new player id");
        stored.player_id = Some(fresh.clone());
        self.save(&stored)?;
        PlayerId::parse(&fresh).map_err(|_| IdentityError::EmptyPlayerId)
    }

    fn display_name(&mut self) -> Result<String, IdentityError> {
        Ok(self
            .load()?
            .player_display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()))
    }

    fn set_display_name(&mut self, name: &str) -> Result<(), IdentityError> {
        let mut stored = self.load()?;
        stored.player_display_name = Some(name.to_string());
        self.save(&stored)
    }
}

/// In-memory identity store for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentityStore {
    pub player_id: Option<PlayerId>,
    pub display_name: Option<String>,
    /// When set, every call fails with `IdentityError::Unavailable`.
    pub fail: bool,
}

impl MemoryIdentityStore {
    /// A store that already knows its player id and name.
    pub fn with_identity(player_id: &str, display_name: &str) -> Self {
        Self {
            player_id: PlayerId::parse(player_id).ok(),
            display_name: Some(display_name.to_string()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), IdentityError> {
        if self.fail {
            return Err(IdentityError::Unavailable("storage disabled".into()));
        }
        Ok(())
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn player_id(&mut self) -> Result<PlayerId, IdentityError> {
        self.check()?;
        if let Some(id) = &self.player_id {
            return Ok(id.clone());
        }
        let id = PlayerId::parse(&uuid::Uuid::new_v4().to_string())
            .map_err(|_| IdentityError::EmptyPlayerId)?;
        self.player_id = Some(id.clone());
        Ok(id)
    }

    fn display_name(&mut self) -> Result<String, IdentityError> {
        self.check()?;
        Ok(self
            .display_name
            .clone()
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()))
    }

    fn set_display_name(&mut self, name: &str) -> Result<(), IdentityError> {
        self.check()?;
        self.display_name = Some(name.to_string());
        Ok(())
    }
}

/// Fetch id and display name, folded into the single event the machine
/// consumes.
pub fn load_identity<S: IdentityStore + ?Sized>(store: &mut S) -> SessionEvent {
    let loaded = store
        .player_id()
        .and_then(|player_id| Ok((player_id, store.display_name()?)));
    match loaded {
        Ok((player_id, display_name)) => SessionEvent::IdentityLoaded {
            player_id,
            display_name,
        },
        Err(e) => {
            warn!(error = %e, "identity load failed");
            SessionEvent::IdentityFailed {
                message: SessionError::from(e).to_string(),
            }
        }
    }
}

/// Run `load_identity` on a background thread.
pub fn spawn_load(store: SharedIdentityStore) -> Receiver<SessionEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let event = match store.lock() {
            Ok(mut guard) => load_identity(&mut *guard),
            Err(_) => SessionEvent::IdentityFailed {
                message: SessionError::from(IdentityError::Poisoned).to_string(),
            },
        };
        // The machine may already be gone; nothing to do then.
        let _ = tx.send(event);
    });
    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn file_store_creates_and_keeps_player_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.json");
        let mut store = FileIdentityStore::new(&path);

        let first = store.player_id().unwrap();
        assert!(path.exists());
        let second = FileIdentityStore::new(&path).player_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 36, "expected a hyphenated uuid");
    }

    #[test]
    fn file_store_display_name_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let mut store = FileIdentityStore::new(&path);
        assert_eq!(store.display_name().unwrap(), "Player");

        let id = store.player_id().unwrap();
        store.set_display_name("Ada").unwrap();
        let mut reopened = FileIdentityStore::new(&path);
        assert_eq!(reopened.display_name().unwrap(), "Ada");
        assert_eq!(reopened.player_id().unwrap(), id);
    }

    #[test]
    fn file_store_reports_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, b"not json").unwrap();
        let err = FileIdentityStore::new(&path).player_id().unwrap_err();
        assert!(matches!(err, IdentityError::Corrupt(_)));
    }

    #[test]
    fn load_identity_folds_failure_into_event() {
        let ev = load_identity(&mut MemoryIdentityStore::failing());
        match ev {
            SessionEvent::IdentityFailed { message } => {
                assert!(message.starts_with("error getting a player id for you"));
            }
            other => panic!("expected IdentityFailed, got {other:?}"),
        }
    }

    #[test]
    fn spawn_load_delivers_one_event() {
        let store: SharedIdentityStore =
            Arc::new(Mutex::new(MemoryIdentityStore::with_identity("p-1", "Bea")));
        let rx = spawn_load(store);
        let ev = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            ev,
            SessionEvent::IdentityLoaded {
                player_id: PlayerId::parse("p-1").unwrap(),
                display_name: "Bea".into(),
            }
        );
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
