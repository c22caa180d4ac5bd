use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{
    Difficulty, Message, Personality, Schedule, SessionRecord, SrsState, UserProfile, VocabEntry,
};
use crate::scheduler::{DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::store::Store;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                target_languages TEXT NOT NULL DEFAULT '[]',
                default_difficulty TEXT NOT NULL DEFAULT 'Beginner',
                assistant_name TEXT NOT NULL,
                assistant_personality TEXT NOT NULL DEFAULT 'Encouraging',
                joined_date INTEGER NOT NULL
            );

            -- Append-only session history
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                language_code TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                summary TEXT NOT NULL,
                translated_summary TEXT,
                messages TEXT NOT NULL DEFAULT '[]',
                vocab_count INTEGER NOT NULL DEFAULT 0
            );

            -- Vocabulary bank, one row per (user, language, lowercased word)
            CREATE TABLE IF NOT EXISTS vocab (
                user_id TEXT NOT NULL,
                language_code TEXT NOT NULL,
                word_key TEXT NOT NULL,
                word TEXT NOT NULL,
                translation TEXT NOT NULL DEFAULT '',
                pronunciation TEXT NOT NULL DEFAULT '',
                example TEXT NOT NULL DEFAULT '',
                date_added INTEGER NOT NULL,
                mastered INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, language_code, word_key)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_time ON sessions(user_id, timestamp);
            "#,
        )?;

        // Run migrations for existing databases
        self.migrate()?;

        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_vocab_next_review ON vocab(user_id, next_review);",
        )?;

        Ok(())
    }

    // Banks created before scheduling existed have no SRS columns; their rows
    // come back as unscheduled.
    fn migrate(&self) -> Result<()> {
        let has_srs: bool = self
            .conn
            .prepare("SELECT next_review FROM vocab LIMIT 1")
            .is_ok();

        if !has_srs {
            debug!("adding scheduling columns to vocab table");
            self.conn.execute_batch(
                r#"
                ALTER TABLE vocab ADD COLUMN interval_days INTEGER;
                ALTER TABLE vocab ADD COLUMN ease_factor REAL;
                ALTER TABLE vocab ADD COLUMN repetition_count INTEGER;
                ALTER TABLE vocab ADD COLUMN last_review INTEGER;
                ALTER TABLE vocab ADD COLUMN next_review INTEGER;
                "#,
            )?;
        }

        Ok(())
    }
}

// Column type mismatches mean the row was written by something else; the row
// is dropped instead of failing the whole read.
fn tolerate<T>(result: rusqlite::Result<Option<T>>) -> rusqlite::Result<Option<T>> {
    match result {
        Err(rusqlite::Error::InvalidColumnType(..))
        | Err(rusqlite::Error::FromSqlConversionFailure(..))
        | Err(rusqlite::Error::IntegralValueOutOfRange(..)) => Ok(None),
        other => other,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

fn user_from_row(row: &Row) -> rusqlite::Result<Option<UserProfile>> {
    let languages: String = row.get(3)?;
    let difficulty: String = row.get(4)?;
    let personality: String = row.get(6)?;
    let joined: i64 = row.get(7)?;

    let (Ok(target_languages), Some(default_difficulty), Some(assistant_personality), Some(joined_date)) = (
        serde_json::from_str::<Vec<String>>(&languages),
        Difficulty::from_str(&difficulty),
        Personality::from_str(&personality),
        from_millis(joined),
    ) else {
        return Ok(None);
    };

    Ok(Some(UserProfile {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        target_languages,
        default_difficulty,
        assistant_name: row.get(5)?,
        assistant_personality,
        joined_date,
    }))
}

fn session_from_row(row: &Row) -> rusqlite::Result<Option<SessionRecord>> {
    let timestamp: i64 = row.get(3)?;
    let duration: i64 = row.get(4)?;
    let difficulty: String = row.get(5)?;
    let messages: String = row.get(8)?;
    let vocab_count: i64 = row.get(9)?;

    let (Some(timestamp), Ok(duration), Some(difficulty), Ok(messages), Ok(vocab_count)) = (
        from_millis(timestamp),
        u32::try_from(duration),
        Difficulty::from_str(&difficulty),
        serde_json::from_str::<Vec<Message>>(&messages),
        u32::try_from(vocab_count),
    ) else {
        return Ok(None);
    };

    Ok(Some(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        language_code: row.get(2)?,
        timestamp,
        duration,
        difficulty,
        summary: row.get(6)?,
        translated_summary: row.get(7)?,
        messages,
        vocab_count,
    }))
}

fn vocab_from_row(row: &Row) -> rusqlite::Result<Option<VocabEntry>> {
    let Some(date_added) = from_millis(row.get(5)?) else {
        return Ok(None);
    };

    let next_review: Option<i64> = row.get(11)?;
    let schedule = match next_review {
        None => Schedule::Unscheduled,
        Some(next) => {
            let interval: Option<i64> = row.get(7)?;
            let ease_factor: Option<f64> = row.get(8)?;
            let repetition_count: Option<i64> = row.get(9)?;
            let last_review: Option<i64> = row.get(10)?;

            let (Ok(interval), Ok(repetition_count), Some(next_review)) = (
                u32::try_from(interval.unwrap_or(0)),
                u32::try_from(repetition_count.unwrap_or(0)),
                from_millis(next),
            ) else {
                return Ok(None);
            };
            let ease_factor = ease_factor.unwrap_or(DEFAULT_EASE_FACTOR);
            if !ease_factor.is_finite() {
                return Ok(None);
            }

            Schedule::Scheduled(SrsState {
                interval,
                ease_factor: ease_factor.max(MIN_EASE_FACTOR),
                repetition_count,
                last_review: last_review.and_then(from_millis),
                next_review,
            })
        }
    };

    Ok(Some(VocabEntry {
        word: row.get(0)?,
        language_code: row.get(1)?,
        translation: row.get(2)?,
        pronunciation: row.get(3)?,
        example: row.get(4)?,
        date_added,
        mastered: row.get::<_, i64>(6)? != 0,
        schedule,
    }))
}

// Collect parsed rows, dropping the malformed ones with a warning
fn keep_valid<T>(rows: Vec<Option<T>>, family: &str) -> Vec<T> {
    let total = rows.len();
    let valid: Vec<T> = rows.into_iter().flatten().collect();
    if valid.len() < total {
        warn!(
            family = family,
            skipped = total - valid.len(),
            "skipping malformed stored records"
        );
    }
    valid
}

impl Store for Database {
    fn read_user(&self) -> Result<Option<UserProfile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, display_name, email, target_languages, default_difficulty,
                   assistant_name, assistant_personality, joined_date
            FROM users
            LIMIT 1
            "#,
        )?;

        let user = stmt.query_row([], |row| tolerate(user_from_row(row)));

        match user {
            Ok(Some(u)) => Ok(Some(u)),
            Ok(None) => {
                warn!("stored user profile is malformed, treating as absent");
                Ok(None)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_user(&self, user: &UserProfile) -> Result<()> {
        let languages = serde_json::to_string(&user.target_languages)?;

        self.atomically(|db| {
            // Singleton: a new profile replaces whatever was there
            db.conn.execute("DELETE FROM users", [])?;
            db.conn.execute(
                r#"
                INSERT INTO users (id, display_name, email, target_languages, default_difficulty,
                                   assistant_name, assistant_personality, joined_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    user.id,
                    user.display_name,
                    user.email,
                    languages,
                    user.default_difficulty.as_str(),
                    user.assistant_name,
                    user.assistant_personality.as_str(),
                    user.joined_date.timestamp_millis()
                ],
            )?;
            Ok(())
        })
    }

    fn read_history(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, language_code, timestamp, duration, difficulty,
                   summary, translated_summary, messages, vocab_count
            FROM sessions
            WHERE user_id = ?1
            ORDER BY timestamp DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map(params![user_id], |row| tolerate(session_from_row(row)))?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(keep_valid(rows, "sessions"))
    }

    fn append_history(&self, record: &SessionRecord) -> Result<()> {
        let messages = serde_json::to_string(&record.messages)?;

        self.conn.execute(
            r#"
            INSERT INTO sessions (id, user_id, language_code, timestamp, duration, difficulty,
                                  summary, translated_summary, messages, vocab_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.user_id,
                record.language_code,
                record.timestamp.timestamp_millis(),
                record.duration,
                record.difficulty.as_str(),
                record.summary,
                record.translated_summary,
                messages,
                record.vocab_count
            ],
        )?;
        Ok(())
    }

    fn read_vocab(&self, user_id: &str) -> Result<Vec<VocabEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT word, language_code, translation, pronunciation, example, date_added,
                   mastered, interval_days, ease_factor, repetition_count, last_review, next_review
            FROM vocab
            WHERE user_id = ?1
            ORDER BY rowid ASC
            "#,
        )?;

        let rows = stmt.query_map(params![user_id], |row| tolerate(vocab_from_row(row)))?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(keep_valid(rows, "vocab"))
    }

    fn write_vocab(&self, user_id: &str, entries: &[VocabEntry]) -> Result<()> {
        self.atomically(|db| {
            db.conn
                .execute("DELETE FROM vocab WHERE user_id = ?1", params![user_id])?;

            let mut stmt = db.conn.prepare(
                r#"
                INSERT INTO vocab (user_id, language_code, word_key, word, translation,
                                   pronunciation, example, date_added, mastered, interval_days,
                                   ease_factor, repetition_count, last_review, next_review)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )?;

            for entry in entries {
                let (interval, ease_factor, repetition_count, last_review, next_review) =
                    match &entry.schedule {
                        Schedule::Unscheduled => (None, None, None, None, None),
                        Schedule::Scheduled(s) => (
                            Some(s.interval),
                            Some(s.ease_factor),
                            Some(s.repetition_count),
                            s.last_review.map(|d| d.timestamp_millis()),
                            Some(s.next_review.timestamp_millis()),
                        ),
                    };

                stmt.execute(params![
                    user_id,
                    entry.language_code,
                    entry.word_key(),
                    entry.word,
                    entry.translation,
                    entry.pronunciation,
                    entry.example,
                    entry.date_added.timestamp_millis(),
                    entry.mastered,
                    interval,
                    ease_factor,
                    repetition_count,
                    last_review,
                    next_review
                ])?;
            }

            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.atomically(|db| {
            db.conn.execute_batch(
                r#"
                DELETE FROM users;
                DELETE FROM sessions;
                DELETE FROM vocab;
                "#,
            )?;
            Ok(())
        })
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.conn.execute_batch("SAVEPOINT unit_of_work")?;

        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE unit_of_work")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO unit_of_work; RELEASE unit_of_work")
                {
                    warn!(error = %rollback, "failed to roll back unit of work");
                }
                Err(e)
            }
        }
    }
}
