use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;
use crate::models::{NewVocab, Schedule, VocabEntry};
use crate::scheduler;
use crate::store::Store;

/// One user's vocabulary bank. Every mutation reads the whole bank, changes
/// it in memory and writes it back inside a single unit of work.
pub struct Vocabulary<'a, S: Store> {
    store: &'a S,
    user_id: &'a str,
    clock: fn() -> DateTime<Utc>,
}

impl<'a, S: Store> Vocabulary<'a, S> {
    pub fn new(store: &'a S, user_id: &'a str) -> Self {
        Self {
            store,
            user_id,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn list_all(&self) -> Result<Vec<VocabEntry>> {
        self.store.read_vocab(self.user_id)
    }

    /// Entries of `language_code` that are unmastered and due now.
    pub fn list_due(&self, language_code: &str) -> Result<Vec<VocabEntry>> {
        let now = (self.clock)();
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| e.language_code == language_code && e.is_due(now))
            .collect())
    }

    // Vocab browser filter: language equality and a case-insensitive match on
    // word or translation.
    pub fn search(&self, language: Option<&str>, text: Option<&str>) -> Result<Vec<VocabEntry>> {
        let needle = text.map(str::to_lowercase);

        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| language.map_or(true, |l| e.language_code == l))
            .filter(|e| {
                needle.as_deref().map_or(true, |n| {
                    e.word.to_lowercase().contains(n) || e.translation.to_lowercase().contains(n)
                })
            })
            .collect())
    }

    /// Add words not yet in the bank. Existing entries, and repeats within
    /// `items`, are skipped. Returns how many entries were created.
    pub fn insert_new(&self, items: &[NewVocab]) -> Result<usize> {
        let now = (self.clock)();

        self.store.atomically(|store| {
            let mut bank = store.read_vocab(self.user_id)?;
            let mut known: HashSet<(String, String)> = bank
                .iter()
                .map(|e| (e.language_code.clone(), e.word_key()))
                .collect();

            let before = bank.len();
            for item in items {
                if !known.insert((item.language_code.clone(), item.word.to_lowercase())) {
                    debug!(word = %item.word, language = %item.language_code, "word already known");
                    continue;
                }

                bank.push(VocabEntry {
                    word: item.word.clone(),
                    language_code: item.language_code.clone(),
                    translation: item.translation.clone(),
                    pronunciation: item.pronunciation.clone(),
                    example: item.example.clone(),
                    date_added: now,
                    mastered: false,
                    schedule: Schedule::Scheduled(scheduler::initial(now)),
                });
            }

            let inserted = bank.len() - before;
            if inserted > 0 {
                store.write_vocab(self.user_id, &bank)?;
            }
            Ok(inserted)
        })
    }

    /// Flip the mastered flag of the entry whose stored word is exactly `word`.
    pub fn toggle_mastery(&self, word: &str, language_code: &str) -> Result<bool> {
        self.store.atomically(|store| {
            let mut bank = store.read_vocab(self.user_id)?;

            let mut found = false;
            for entry in bank
                .iter_mut()
                .filter(|e| e.word == word && e.language_code == language_code)
            {
                entry.mastered = !entry.mastered;
                found = true;
            }

            if found {
                store.write_vocab(self.user_id, &bank)?;
            } else {
                debug!(word = word, language = language_code, "no entry to toggle");
            }
            Ok(found)
        })
    }

    /// Schedule one review for every stored entry of `language_code` whose
    /// word case-insensitively appears in `words`. Each entry is updated at
    /// most once; unknown words are ignored. Returns the number updated.
    pub fn apply_review_outcomes(
        &self,
        words: &[String],
        language_code: &str,
        success: bool,
    ) -> Result<usize> {
        let wanted: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        if wanted.is_empty() {
            return Ok(0);
        }
        let now = (self.clock)();

        self.store.atomically(|store| {
            let mut bank = store.read_vocab(self.user_id)?;

            let mut updated = 0;
            for entry in bank
                .iter_mut()
                .filter(|e| e.language_code == language_code && wanted.contains(&e.word_key()))
            {
                let (schedule, mastered) =
                    scheduler::review(&entry.schedule, success, now).into_schedule();
                entry.schedule = schedule;
                entry.mastered = mastered;
                updated += 1;
            }

            if updated > 0 {
                store.write_vocab(self.user_id, &bank)?;
            }
            debug!(
                requested = wanted.len(),
                updated = updated,
                success = success,
                language = language_code,
                "applied review outcomes"
            );
            Ok(updated)
        })
    }

    /// Mark words as mastered (or not) by running them through the
    /// scheduler, so the schedule stays consistent with the flag over time.
    pub fn set_mastery_bulk(
        &self,
        words: &[String],
        language_code: &str,
        mastered: bool,
    ) -> Result<usize> {
        self.apply_review_outcomes(words, language_code, mastered)
    }

    pub fn next_due(&self, language_code: &str) -> Result<Option<VocabEntry>> {
        self.next_due_with(language_code, &mut rand::thread_rng())
    }

    /// Stochastic pick among due entries, favouring overdue words and words
    /// with few successful reviews.
    pub fn next_due_with<R: Rng>(
        &self,
        language_code: &str,
        rng: &mut R,
    ) -> Result<Option<VocabEntry>> {
        let due = self.list_due(language_code)?;
        if due.is_empty() {
            return Ok(None);
        }

        let now = (self.clock)();
        let weights: Vec<f64> = due
            .iter()
            .map(|e| {
                let overdue_days = match e.schedule.next_review() {
                    Some(next) => now.signed_duration_since(next).num_days().max(0) as f64 + 1.0,
                    None => 1.0,
                };
                let familiarity = 6.0 - e.schedule.repetition_count().min(5) as f64;
                overdue_days * familiarity
            })
            .collect();

        let total_weight: f64 = weights.iter().sum();
        let mut random_point = rng.gen::<f64>() * total_weight;

        for (i, weight) in weights.iter().enumerate() {
            random_point -= weight;
            if random_point <= 0.0 {
                return Ok(Some(due[i].clone()));
            }
        }

        Ok(due.into_iter().next())
    }
}
