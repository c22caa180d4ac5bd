use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewVocab, SessionDraft, SessionRecord};
use crate::store::Store;
use crate::vocab::Vocabulary;

/// Turns a finished conversation into a history entry plus vocabulary
/// updates.
pub struct SessionRecorder<'a, S: Store> {
    store: &'a S,
    clock: fn() -> DateTime<Utc>,
}

impl<'a, S: Store> SessionRecorder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Record `draft` for the stored user. The history append, the success
    /// outcomes for `mastered_words` and the insertion of new vocabulary run
    /// in that order as one unit of work.
    pub fn complete_session(&self, draft: SessionDraft) -> Result<SessionRecord> {
        if !draft.has_learner_message() {
            return Err(Error::EmptySession);
        }
        let user = self.store.read_user()?.ok_or(Error::NoUser)?;
        let now = (self.clock)();

        let new_vocab: Vec<NewVocab> = draft
            .new_vocabulary
            .iter()
            .cloned()
            .map(|w| w.in_language(&draft.language_code))
            .collect();

        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            language_code: draft.language_code.clone(),
            timestamp: now,
            duration: draft.duration_minutes(),
            difficulty: user.default_difficulty,
            summary: draft.summary,
            translated_summary: draft.translated_summary,
            messages: draft.messages,
            vocab_count: new_vocab.len() as u32,
        };

        let vocab = Vocabulary::new(self.store, &user.id).with_clock(self.clock);
        let (reviewed, inserted) = self.store.atomically(|store| {
            store.append_history(&record)?;

            let reviewed = if draft.mastered_words.is_empty() {
                0
            } else {
                vocab.apply_review_outcomes(&draft.mastered_words, &record.language_code, true)?
            };
            let inserted = vocab.insert_new(&new_vocab)?;

            Ok((reviewed, inserted))
        })?;

        info!(
            session = %record.id,
            language = %record.language_code,
            duration = record.duration,
            reviewed = reviewed,
            inserted = inserted,
            "session recorded"
        );
        Ok(record)
    }
}
