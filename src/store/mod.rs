pub mod jsonl;
pub mod memory;

pub use self::jsonl::JsonlStore;
pub use self::memory::MemoryStore;

use crate::error::StorageError;
use crate::grader::{round1, EvaluationResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recorded evaluation. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSession {
    pub id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub result: EvaluationResult,
    pub image_ref: String,
}

/// Filter and page over stored sessions. `from` is inclusive, `to`
/// exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionQuery {
    pub character_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SessionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_character(id: &str) -> Self {
        Self {
            character_id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, s: &EvaluationSession) -> bool {
        if let Some(id) = &self.character_id {
            if &s.result.character_id != id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if s.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if s.timestamp >= to {
                return false;
            }
        }
        true
    }

    /// Applies the filter, newest first (ties by id, newest first), then the
    /// page window.
    pub fn apply<'a, I>(&self, sessions: I) -> Vec<EvaluationSession>
    where
        I: IntoIterator<Item = &'a EvaluationSession>,
    {
        let mut hits: Vec<&EvaluationSession> =
            sessions.into_iter().filter(|s| self.matches(s)).collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        hits.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub count: usize,
    pub average: Option<f64>,
    pub best: Option<f64>,
    /// Consecutive UTC days with practice, counted back from the day of the
    /// most recent session.
    pub streak_days: u32,
}

impl HistoryStats {
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a EvaluationSession>,
    {
        let mut count = 0;
        let mut sum = 0.0;
        let mut best: Option<f64> = None;
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();

        for s in sessions {
            let score = s.result.final_score;
            count += 1;
            sum += score;
            best = Some(best.map_or(score, |b| b.max(score)));
            days.insert(s.timestamp.date_naive());
        }

        Self {
            count,
            average: (count > 0).then(|| round1(sum / count as f64)),
            best,
            streak_days: streak(&days),
        }
    }
}

fn streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut current = match days.iter().next_back() {
        Some(d) => *d,
        None => return 0,
    };
    let mut n = 1;
    while let Some(prev) = current.pred_opt() {
        if !days.contains(&prev) {
            break;
        }
        n += 1;
        current = prev;
    }
    n
}

/// Append-only history of evaluations.
///
/// Implementations serialize `record_at` calls so entries never interleave,
/// and readers see either the state before or after a write.
pub trait SessionStore: Send + Sync {
    fn record_at(
        &self,
        result: &EvaluationResult,
        image_ref: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SessionId, StorageError>;

    /// Consistent copy of every stored session, in write order.
    fn snapshot(&self) -> Result<Vec<EvaluationSession>, StorageError>;

    fn record(&self, result: &EvaluationResult, image_ref: &str) -> Result<SessionId, StorageError> {
        self.record_at(result, image_ref, Utc::now())
    }

    fn query(&self, query: &SessionQuery) -> Result<Vec<EvaluationSession>, StorageError> {
        Ok(query.apply(&self.snapshot()?))
    }

    fn aggregate(&self, character_id: Option<&str>) -> Result<HistoryStats, StorageError> {
        let all = self.snapshot()?;
        Ok(HistoryStats::from_sessions(all.iter().filter(|s| {
            character_id.map_or(true, |id| s.result.character_id == id)
        })))
    }

    fn latest_for(&self, character_id: &str) -> Result<Option<EvaluationSession>, StorageError> {
        let q = SessionQuery::for_character(character_id).page(0, 1);
        Ok(self.query(&q)?.into_iter().next())
    }
}
