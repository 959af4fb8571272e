use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::workflow::ReservationSnapshot;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("session snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Хранилище снапшотов сессий бронирования.
pub trait SessionRepository: Send + Sync {
    fn save(&self, snapshot: &ReservationSnapshot) -> Result<(), RepositoryError>;

    fn load(&self, session_id: Uuid) -> Result<Option<ReservationSnapshot>, RepositoryError>;

    fn remove(&self, session_id: Uuid) -> Result<(), RepositoryError>;
}

/// Хранилище в памяти процесса. Используется по умолчанию.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<Uuid, ReservationSnapshot>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or_else(|p| p.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn save(&self, snapshot: &ReservationSnapshot) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }

    fn load(&self, session_id: Uuid) -> Result<Option<ReservationSnapshot>, RepositoryError> {
        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        Ok(sessions.get(&session_id).cloned())
    }

    fn remove(&self, session_id: Uuid) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.remove(&session_id);
        Ok(())
    }
}

/// Снапшоты в JSON-файлах, по одному на сессию: `<dir>/<session_id>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionRepository {
    dir: PathBuf,
}

impl FileSessionRepository {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Session snapshots stored in {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }
}

impl SessionRepository for FileSessionRepository {
    fn save(&self, snapshot: &ReservationSnapshot) -> Result<(), RepositoryError> {
        let path = self.path_for(snapshot.session_id);
        // Пишем во временный файл и переименовываем, чтобы не оставить обрезанный JSON
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved session {} ({})", snapshot.session_id, snapshot.phase);
        Ok(())
    }

    fn load(&self, session_id: Uuid) -> Result<Option<ReservationSnapshot>, RepositoryError> {
        match fs::read(self.path_for(session_id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, session_id: Uuid) -> Result<(), RepositoryError> {
        match fs::remove_file(self.path_for(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
