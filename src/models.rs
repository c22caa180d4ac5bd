use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Learner's preferred conversation difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    #[serde(rename = "Auto-adapt")]
    AutoAdapt,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
            Difficulty::AutoAdapt => "Auto-adapt",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" | "b" => Some(Difficulty::Beginner),
            "intermediate" | "i" => Some(Difficulty::Intermediate),
            "advanced" | "a" => Some(Difficulty::Advanced),
            "auto-adapt" | "auto" | "autoadapt" => Some(Difficulty::AutoAdapt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Personality {
    #[default]
    Encouraging,
    Direct,
    Playful,
    Academic,
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Encouraging => "Encouraging",
            Personality::Direct => "Direct",
            Personality::Playful => "Playful",
            Personality::Academic => "Academic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "encouraging" => Some(Personality::Encouraging),
            "direct" => Some(Personality::Direct),
            "playful" => Some(Personality::Playful),
            "academic" => Some(Personality::Academic),
            _ => None,
        }
    }
}

pub const DEFAULT_ASSISTANT_NAME: &str = "LinguistBuddy";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub target_languages: Vec<String>,
    pub default_difficulty: Difficulty,
    pub assistant_name: String,
    pub assistant_personality: Personality,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_date: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(display_name: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            target_languages: Vec::new(),
            default_difficulty: Difficulty::default(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            assistant_personality: Personality::default(),
            joined_date: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// A completed practice session, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub language_code: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub duration: u32,
    pub difficulty: Difficulty,
    pub summary: String,
    pub translated_summary: Option<String>,
    pub messages: Vec<Message>,
    pub vocab_count: u32,
}

/// A vocabulary candidate as extracted from a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedWord {
    pub word: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub example: String,
}

impl ExtractedWord {
    pub fn in_language(self, language_code: &str) -> NewVocab {
        NewVocab {
            word: self.word,
            translation: self.translation,
            pronunciation: self.pronunciation,
            example: self.example,
            language_code: language_code.to_string(),
        }
    }
}

/// Input to `Vocabulary::insert_new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVocab {
    pub word: String,
    pub translation: String,
    pub pronunciation: String,
    pub example: String,
    pub language_code: String,
}

/// Everything the conversation layer hands over when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub language_code: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub new_vocabulary: Vec<ExtractedWord>,
    #[serde(default)]
    pub mastered_words: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub translated_summary: Option<String>,
}

impl SessionDraft {
    pub fn has_learner_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    // Rough heuristic: half a minute per message
    pub fn duration_minutes(&self) -> u32 {
        (self.messages.len() as u32).div_ceil(2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsState {
    pub interval: u32,
    pub ease_factor: f64,
    pub repetition_count: u32,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub next_review: DateTime<Utc>,
}

/// Review schedule of a vocabulary entry. `Unscheduled` entries carry no SRS
/// history and are always due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Schedule {
    Unscheduled,
    Scheduled(SrsState),
}

impl Schedule {
    pub fn next_review(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Unscheduled => None,
            Schedule::Scheduled(s) => Some(s.next_review),
        }
    }

    pub fn interval(&self) -> u32 {
        match self {
            Schedule::Unscheduled => 0,
            Schedule::Scheduled(s) => s.interval,
        }
    }

    pub fn repetition_count(&self) -> u32 {
        match self {
            Schedule::Unscheduled => 0,
            Schedule::Scheduled(s) => s.repetition_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub word: String,
    pub language_code: String,
    pub translation: String,
    pub pronunciation: String,
    pub example: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_added: DateTime<Utc>,
    pub mastered: bool,
    pub schedule: Schedule,
}

impl VocabEntry {
    /// Case-folded identity used for deduplication and review matching.
    pub fn word_key(&self) -> String {
        self.word.to_lowercase()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.mastered
            && match self.schedule.next_review() {
                None => true,
                Some(next) => next <= now,
            }
    }

    pub fn review_label(&self, now: DateTime<Utc>) -> ReviewLabel {
        let Some(next) = self.schedule.next_review() else {
            return ReviewLabel::New;
        };

        let millis = (next - now).num_milliseconds() as f64;
        let days = (millis / Duration::days(1).num_milliseconds() as f64).ceil() as i64;
        if days <= 0 {
            ReviewLabel::Due
        } else {
            ReviewLabel::InDays(days)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewLabel {
    New,
    Due,
    InDays(i64),
}

impl std::fmt::Display for ReviewLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewLabel::New => write!(f, "New"),
            ReviewLabel::Due => write!(f, "Review Due"),
            ReviewLabel::InDays(d) => write!(f, "Review in {}d", d),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewOutcome {
    Success,
    Fail,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Success => "success",
            ReviewOutcome::Fail => "fail",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" | "s" | "yes" | "y" | "good" | "1" => Some(ReviewOutcome::Success),
            "fail" | "f" | "no" | "n" | "bad" | "0" => Some(ReviewOutcome::Fail),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReviewOutcome::Success)
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry(schedule: Schedule, mastered: bool) -> VocabEntry {
        VocabEntry {
            word: "Bonjour".to_string(),
            language_code: "fr".to_string(),
            translation: "hello".to_string(),
            pronunciation: "bon-zhoor".to_string(),
            example: "Bonjour, ça va ?".to_string(),
            date_added: at(0),
            mastered,
            schedule,
        }
    }

    fn scheduled(next_review: DateTime<Utc>) -> Schedule {
        Schedule::Scheduled(SrsState {
            interval: 1,
            ease_factor: 2.5,
            repetition_count: 1,
            last_review: None,
            next_review,
        })
    }

    mod due_tests {
        use super::*;

        #[test]
        fn unscheduled_is_due() {
            assert!(entry(Schedule::Unscheduled, false).is_due(at(0)));
        }

        #[test]
        fn due_when_next_review_reached() {
            let e = entry(scheduled(at(100)), false);
            assert!(e.is_due(at(100)));
            assert!(e.is_due(at(101)));
            assert!(!e.is_due(at(99)));
        }

        #[test]
        fn mastered_is_never_due() {
            assert!(!entry(Schedule::Unscheduled, true).is_due(at(0)));
            assert!(!entry(scheduled(at(0)), true).is_due(at(1_000_000)));
        }

        #[test]
        fn word_key_is_lowercase() {
            assert_eq!(entry(Schedule::Unscheduled, false).word_key(), "bonjour");
        }
    }

    mod review_label_tests {
        use super::*;

        const DAY: i64 = 86_400;

        #[test]
        fn unscheduled_is_new() {
            let e = entry(Schedule::Unscheduled, false);
            assert_eq!(e.review_label(at(0)), ReviewLabel::New);
            assert_eq!(e.review_label(at(0)).to_string(), "New");
        }

        #[test]
        fn past_due_is_due() {
            let e = entry(scheduled(at(DAY)), false);
            assert_eq!(e.review_label(at(3 * DAY)), ReviewLabel::Due);
            assert_eq!(e.review_label(at(DAY)), ReviewLabel::Due);
        }

        #[test]
        fn partial_days_round_up() {
            let e = entry(scheduled(at(DAY + 1)), false);
            assert_eq!(e.review_label(at(0)), ReviewLabel::InDays(2));
            assert_eq!(e.review_label(at(0)).to_string(), "Review in 2d");
        }

        #[test]
        fn exact_days() {
            let e = entry(scheduled(at(6 * DAY)), false);
            assert_eq!(e.review_label(at(0)), ReviewLabel::InDays(6));
        }
    }

    mod session_draft_tests {
        use super::*;

        fn draft(roles: &[Role]) -> SessionDraft {
            SessionDraft {
                language_code: "fr".to_string(),
                messages: roles
                    .iter()
                    .map(|r| Message {
                        role: *r,
                        content: "salut".to_string(),
                        timestamp: at(0),
                    })
                    .collect(),
                new_vocabulary: vec![],
                mastered_words: vec![],
                summary: String::new(),
                translated_summary: None,
            }
        }

        #[test]
        fn duration_is_half_minute_per_message_rounded_up() {
            assert_eq!(draft(&[]).duration_minutes(), 0);
            assert_eq!(draft(&[Role::User]).duration_minutes(), 1);
            assert_eq!(draft(&[Role::User, Role::Assistant]).duration_minutes(), 1);
            assert_eq!(
                draft(&[Role::User, Role::Assistant, Role::User]).duration_minutes(),
                2
            );
        }

        #[test]
        fn learner_message_detection() {
            assert!(!draft(&[]).has_learner_message());
            assert!(!draft(&[Role::Assistant]).has_learner_message());
            assert!(draft(&[Role::Assistant, Role::User]).has_learner_message());
        }

        #[test]
        fn parses_collaborator_json() {
            let json = r#"{
                "languageCode": "fr",
                "messages": [
                    {"role": "assistant", "content": "Bonjour !", "timestamp": 1700000000000},
                    {"role": "user", "content": "Bonjour", "timestamp": 1700000005000}
                ],
                "newVocabulary": [{"word": "chat", "translation": "cat"}],
                "masteredWords": ["bonjour"],
                "summary": "Greetings"
            }"#;
            let d: SessionDraft = serde_json::from_str(json).unwrap();
            assert_eq!(d.language_code, "fr");
            assert_eq!(d.messages.len(), 2);
            assert_eq!(d.messages[1].role, Role::User);
            assert_eq!(d.messages[0].timestamp.timestamp_millis(), 1_700_000_000_000);
            assert_eq!(d.new_vocabulary[0].word, "chat");
            assert_eq!(d.new_vocabulary[0].pronunciation, "");
            assert_eq!(d.mastered_words, vec!["bonjour".to_string()]);
            assert!(d.translated_summary.is_none());
        }

        #[test]
        fn extracted_word_takes_language() {
            let w = ExtractedWord {
                word: "chat".to_string(),
                translation: "cat".to_string(),
                pronunciation: "sha".to_string(),
                example: "Le chat dort.".to_string(),
            };
            let v = w.in_language("fr");
            assert_eq!(v.language_code, "fr");
            assert_eq!(v.word, "chat");
        }
    }

    mod enum_tests {
        use super::*;

        #[test]
        fn difficulty_round_trips_through_str() {
            for d in [
                Difficulty::Beginner,
                Difficulty::Intermediate,
                Difficulty::Advanced,
                Difficulty::AutoAdapt,
            ] {
                assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
            }
            assert_eq!(Difficulty::from_str("auto"), Some(Difficulty::AutoAdapt));
            assert_eq!(Difficulty::from_str("expert"), None);
        }

        #[test]
        fn difficulty_serializes_like_the_app() {
            assert_eq!(
                serde_json::to_string(&Difficulty::AutoAdapt).unwrap(),
                "\"Auto-adapt\""
            );
        }

        #[test]
        fn personality_from_str_case_insensitive() {
            assert_eq!(Personality::from_str("PLAYFUL"), Some(Personality::Playful));
            assert_eq!(Personality::from_str("grumpy"), None);
        }

        #[test]
        fn review_outcome_variants() {
            for v in ["success", "s", "yes", "Y", "good", "1"] {
                assert_eq!(ReviewOutcome::from_str(v), Some(ReviewOutcome::Success));
            }
            for v in ["fail", "F", "no", "n", "bad", "0"] {
                assert_eq!(ReviewOutcome::from_str(v), Some(ReviewOutcome::Fail));
            }
            assert_eq!(ReviewOutcome::from_str("partial"), None);
            assert!(ReviewOutcome::Success.is_success());
            assert!(!ReviewOutcome::Fail.is_success());
        }

        #[test]
        fn new_user_has_app_defaults() {
            let u = UserProfile::new("Ana", "ana@example.com", at(0));
            assert_eq!(u.default_difficulty, Difficulty::Beginner);
            assert_eq!(u.assistant_name, "LinguistBuddy");
            assert_eq!(u.assistant_personality, Personality::Encouraging);
            assert!(u.target_languages.is_empty());
            assert!(!u.id.is_empty());
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn serializes_ok_correctly() {
            let json = serde_json::to_string(&JsonOutput::ok("test")).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let json = serde_json::to_string(&JsonOutput::<()>::err("error")).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
