use super::{EvaluationSession, SessionId, SessionStore};
use crate::error::StorageError;
use crate::grader::EvaluationResult;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Log {
    sessions: Vec<EvaluationSession>,
    next_id: u64,
}

/// Volatile store; history lasts as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: RwLock<Log>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.read().map(|l| l.sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("session log lock poisoned".to_string())
}

impl SessionStore for MemoryStore {
    fn record_at(
        &self,
        result: &EvaluationResult,
        image_ref: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        let mut log = self.log.write().map_err(|_| poisoned())?;
        log.next_id += 1;
        let id = SessionId(log.next_id);
        log.sessions.push(EvaluationSession {
            id,
            timestamp,
            result: result.clone(),
            image_ref: image_ref.to_string(),
        });
        Ok(id)
    }

    fn snapshot(&self) -> Result<Vec<EvaluationSession>, StorageError> {
        Ok(self.log.read().map_err(|_| poisoned())?.sessions.clone())
    }
}
