use crate::error::Result;
use crate::models::{SessionRecord, UserProfile, VocabEntry};

/// Durable storage for the three record families: the user profile, session
/// history and the vocabulary bank. No business logic lives here.
///
/// Reads treat malformed rows as absent rather than failing.
pub trait Store {
    fn read_user(&self) -> Result<Option<UserProfile>>;

    fn write_user(&self, user: &UserProfile) -> Result<()>;

    /// Sessions for `user_id`, newest first.
    fn read_history(&self, user_id: &str) -> Result<Vec<SessionRecord>>;

    fn append_history(&self, record: &SessionRecord) -> Result<()>;

    /// The whole vocabulary bank of `user_id` in insertion order.
    fn read_vocab(&self, user_id: &str) -> Result<Vec<VocabEntry>>;

    /// Replace the whole vocabulary bank of `user_id`.
    fn write_vocab(&self, user_id: &str, entries: &[VocabEntry]) -> Result<()>;

    /// Drop every record family. Used on logout.
    fn clear(&self) -> Result<()>;

    /// Run `f` as one unit of work: either everything it wrote lands or none
    /// of it does. Calls may nest.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
