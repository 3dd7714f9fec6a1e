use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::DashboardConfig;
use crate::console_log;
use crate::dataset::AnnotatedDataset;
use crate::error::DashboardError;

// One dashboard instance. Owns at most one dataset; a new upload replaces it wholesale.
pub struct Session {
    pub id: String,
    pub opened_seq: u64,
    pub dataset: Option<AnnotatedDataset>,
}

// Module state: explicit per-session datasets plus the active configuration
pub struct ModuleState {
    sessions: HashMap<String, Session>,
    pub config: DashboardConfig,
    next_seq: u64,
}

// Create a global static instance of the module state
lazy_static! {
    static ref MODULE_STATE: ReentrantMutex<RefCell<ModuleState>> =
        ReentrantMutex::new(RefCell::new(ModuleState::new()));
}

impl Default for ModuleState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleState {
    pub fn new() -> Self {
        ModuleState {
            sessions: HashMap::new(),
            config: DashboardConfig::default(),
            next_seq: 0,
        }
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    /// Open a new session, evicting the oldest one when the store is full.
    pub fn open_session(&mut self) -> String {
        while self.sessions.len() >= self.config.max_sessions.max(1) {
            let oldest = self
                .sessions
                .values()
                .min_by_key(|s| s.opened_seq)
                .map(|s| s.id.clone());
            match oldest {
                Some(id) => {
                    console_log!("Evicting session {} (limit {})", id, self.config.max_sessions);
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                opened_seq: self.next_seq,
                dataset: None,
            },
        );
        self.next_seq += 1;
        console_log!("Opened session {}", id);
        id
    }

    pub fn close_session(&mut self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            console_log!("Closed session {}", session_id);
        }
        removed
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Replace the session's dataset with a freshly annotated upload.
    pub fn store_dataset(&mut self, session_id: &str, dataset: AnnotatedDataset) -> Result<(), DashboardError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| DashboardError::UnknownSession(session_id.to_string()))?;
        session.dataset = Some(dataset);
        Ok(())
    }

    /// The session's dataset, `None` before the first successful upload.
    pub fn dataset(&self, session_id: &str) -> Result<Option<&AnnotatedDataset>, DashboardError> {
        self.sessions
            .get(session_id)
            .map(|s| s.dataset.as_ref())
            .ok_or_else(|| DashboardError::UnknownSession(session_id.to_string()))
    }

    /// Like `dataset`, but a missing upload is an error.
    pub fn require_dataset(&self, session_id: &str) -> Result<&AnnotatedDataset, DashboardError> {
        self.dataset(session_id)?
            .ok_or_else(|| DashboardError::NoDataset(session_id.to_string()))
    }
}
