use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{SessionRecord, VocabEntry};
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_sessions: usize,
    pub total_minutes: u32,
    pub total_words: usize,
    pub mastered_words: usize,
    pub due_now: usize,
}

impl Stats {
    pub fn compute(history: &[SessionRecord], bank: &[VocabEntry], now: DateTime<Utc>) -> Self {
        Self {
            total_sessions: history.len(),
            total_minutes: history.iter().map(|s| s.duration).sum(),
            total_words: bank.len(),
            mastered_words: bank.iter().filter(|e| e.mastered).count(),
            due_now: bank.iter().filter(|e| e.is_due(now)).count(),
        }
    }

    pub fn load<S: Store>(store: &S, user_id: &str, now: DateTime<Utc>) -> Result<Self> {
        let history = store.read_history(user_id)?;
        let bank = store.read_vocab(user_id)?;
        Ok(Self::compute(&history, &bank, now))
    }
}
