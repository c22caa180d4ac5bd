mod config;
mod db;
mod error;
mod logging;
mod models;
mod recorder;
mod scheduler;
mod stats;
mod store;
mod vocab;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

use config::Config;
use db::Database;
use error::{Error, Result};
use models::{
    Difficulty, JsonOutput, NewVocab, Personality, ReviewOutcome, SessionDraft, UserProfile,
    VocabEntry,
};
use recorder::SessionRecorder;
use stats::Stats;
use store::Store;
use vocab::Vocabulary;

#[derive(Parser)]
#[command(name = "vocabank")]
#[command(about = "Vocabulary bank and spaced-repetition scheduler for language practice")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Database file (overrides VOCABANK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage the learner profile
    #[command(subcommand)]
    User(UserCommands),

    /// Clear the profile, history and vocabulary bank
    Logout,

    /// Manage the vocabulary bank
    #[command(subcommand)]
    Vocab(VocabCommands),

    /// Record practice sessions
    #[command(subcommand)]
    Session(SessionCommands),

    /// List completed sessions, newest first
    History {
        /// Filter by language code
        #[arg(long, short)]
        lang: Option<String>,
    },

    /// Show learning statistics
    Stats,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create the learner profile (replaces any existing one)
    Create {
        /// Display name
        name: String,

        #[arg(long, short)]
        email: String,

        /// Beginner, Intermediate, Advanced or Auto-adapt
        #[arg(long, short)]
        difficulty: Option<String>,

        /// Comma-separated target language codes
        #[arg(long, short)]
        languages: Option<String>,
    },

    /// Show the learner profile
    Show,

    /// Update profile settings
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, short)]
        difficulty: Option<String>,

        #[arg(long)]
        assistant_name: Option<String>,

        /// Encouraging, Direct, Playful or Academic
        #[arg(long, short)]
        personality: Option<String>,

        /// Comma-separated target language codes (replaces existing)
        #[arg(long, short)]
        languages: Option<String>,
    },
}

#[derive(Subcommand)]
enum VocabCommands {
    /// List vocabulary, optionally filtered
    List {
        /// Language code, or "all"
        #[arg(long, short)]
        lang: Option<String>,

        /// Text to match in word or translation
        #[arg(long, short)]
        search: Option<String>,
    },

    /// List words due for review
    Due {
        #[arg(long, short)]
        lang: String,
    },

    /// Add a word to the bank (skipped if already known)
    Add {
        word: String,

        #[arg(long, short)]
        lang: String,

        #[arg(long, short)]
        translation: Option<String>,

        #[arg(long, short)]
        pronunciation: Option<String>,

        #[arg(long, short)]
        example: Option<String>,
    },

    /// Flip the mastered flag of a word (exact spelling)
    Toggle {
        word: String,

        #[arg(long, short)]
        lang: String,
    },

    /// Record a review outcome for words
    Review {
        #[arg(required = true)]
        words: Vec<String>,

        #[arg(long, short)]
        lang: String,

        /// Review outcome: success/fail
        #[arg(long, short)]
        outcome: String,
    },

    /// Mark words as mastered through the scheduler
    Master {
        #[arg(required = true)]
        words: Vec<String>,

        #[arg(long, short)]
        lang: String,

        /// Record a failed review instead
        #[arg(long)]
        unset: bool,
    },

    /// Pick the next word to review (stochastic selection)
    Next {
        #[arg(long, short)]
        lang: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Record a finished session from a JSON draft ("-" reads stdin)
    Complete { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db.clone());
    logging::init_tracing(&config.log_level);

    let json = cli.json;
    if let Err(e) = run(cli, &config) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open(&config.db_path)?;
    db.init()?;
    Ok(db)
}

fn current_user(db: &Database) -> Result<UserProfile> {
    db.read_user()?.ok_or(Error::NoUser)
}

fn parse_difficulty(s: &str) -> Result<Difficulty> {
    Difficulty::from_str(s).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "difficulty '{}'. Use: Beginner, Intermediate, Advanced, Auto-adapt",
            s
        ))
    })
}

fn parse_personality(s: &str) -> Result<Personality> {
    Personality::from_str(s).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "personality '{}'. Use: Encouraging, Direct, Playful, Academic",
            s
        ))
    })
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let db = open_database(config)?;

    match cli.command {
        Commands::Init => {
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", config.db_path.display());
            }
        }

        Commands::User(user_cmd) => run_user(user_cmd, &db, cli.json)?,

        Commands::Logout => {
            db.clear()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Profile, history and vocabulary cleared.");
            }
        }

        Commands::Vocab(vocab_cmd) => {
            let user = current_user(&db)?;
            run_vocab(vocab_cmd, &Vocabulary::new(&db, &user.id), cli.json)?;
        }

        Commands::Session(SessionCommands::Complete { file }) => {
            let raw = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)?
            };
            let draft: SessionDraft = serde_json::from_str(&raw)?;
            let new_words = draft.new_vocabulary.len();

            let record = SessionRecorder::new(&db).complete_session(draft)?;

            if cli.json {
                print_json(&record)?;
            } else {
                println!("Session {} recorded.", record.id);
                println!(
                    "{} mins • {} • {} new word(s) extracted",
                    record.duration,
                    record.difficulty.as_str(),
                    new_words
                );
            }
        }

        Commands::History { lang } => {
            let user = current_user(&db)?;
            let history: Vec<_> = db
                .read_history(&user.id)?
                .into_iter()
                .filter(|s| lang.as_deref().map_or(true, |l| s.language_code == l))
                .collect();

            if cli.json {
                print_json(&history)?;
            } else if history.is_empty() {
                println!("No sessions found.");
            } else {
                println!("{:<17} {:<5} {:<6} {:<13} SUMMARY", "DATE", "LANG", "MINS", "DIFFICULTY");
                println!("{}", "-".repeat(80));
                for s in history {
                    println!(
                        "{:<17} {:<5} {:<6} {:<13} {}",
                        s.timestamp.format("%Y-%m-%d %H:%M"),
                        s.language_code,
                        s.duration,
                        s.difficulty.as_str(),
                        truncate(&s.summary, 36)
                    );
                }
            }
        }

        Commands::Stats => {
            let user = current_user(&db)?;
            let stats = Stats::load(&db, &user.id, Utc::now())?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Learning Statistics ===");
                println!("Sessions: {}", stats.total_sessions);
                println!("Minutes practised: {}", stats.total_minutes);
                println!("Words in bank: {}", stats.total_words);
                println!("Mastered: {}", stats.mastered_words);
                println!("Due for review: {}", stats.due_now);
            }
        }
    }

    Ok(())
}

fn run_user(cmd: UserCommands, db: &Database, json: bool) -> Result<()> {
    match cmd {
        UserCommands::Create {
            name,
            email,
            difficulty,
            languages,
        } => {
            let mut user = UserProfile::new(&name, &email, Utc::now());
            if let Some(d) = difficulty {
                user.default_difficulty = parse_difficulty(&d)?;
            }
            if let Some(l) = languages {
                user.target_languages = split_list(&l);
            }
            db.write_user(&user)?;

            if json {
                print_json(&user)?;
            } else {
                println!("Created profile '{}' with ID: {}", user.display_name, user.id);
            }
        }

        UserCommands::Show => {
            let user = current_user(db)?;
            if json {
                print_json(&user)?;
            } else {
                println!("Name: {}", user.display_name);
                println!("ID: {}", user.id);
                println!("Email: {}", user.email);
                println!(
                    "Languages: {}",
                    if user.target_languages.is_empty() {
                        "-".to_string()
                    } else {
                        user.target_languages.join(", ")
                    }
                );
                println!("Difficulty: {}", user.default_difficulty.as_str());
                println!(
                    "Assistant: {} ({})",
                    user.assistant_name,
                    user.assistant_personality.as_str()
                );
                println!("Joined: {}", user.joined_date.format("%Y-%m-%d"));
            }
        }

        UserCommands::Set {
            name,
            email,
            difficulty,
            assistant_name,
            personality,
            languages,
        } => {
            let mut user = current_user(db)?;
            if let Some(n) = name {
                user.display_name = n;
            }
            if let Some(e) = email {
                user.email = e;
            }
            if let Some(d) = difficulty {
                user.default_difficulty = parse_difficulty(&d)?;
            }
            if let Some(a) = assistant_name {
                user.assistant_name = a;
            }
            if let Some(p) = personality {
                user.assistant_personality = parse_personality(&p)?;
            }
            if let Some(l) = languages {
                user.target_languages = split_list(&l);
            }
            db.write_user(&user)?;

            if json {
                print_json(&user)?;
            } else {
                println!("Settings saved.");
            }
        }
    }

    Ok(())
}

fn run_vocab(cmd: VocabCommands, vocab: &Vocabulary<'_, Database>, json: bool) -> Result<()> {
    match cmd {
        VocabCommands::List { lang, search } => {
            let lang = lang.filter(|l| !l.eq_ignore_ascii_case("all"));
            let entries = vocab.search(lang.as_deref(), search.as_deref())?;
            print_entries(&entries, json, "No vocabulary found.")?;
        }

        VocabCommands::Due { lang } => {
            let entries = vocab.list_due(&lang)?;
            print_entries(&entries, json, "Nothing due for review.")?;
        }

        VocabCommands::Add {
            word,
            lang,
            translation,
            pronunciation,
            example,
        } => {
            let item = NewVocab {
                word: word.clone(),
                translation: translation.unwrap_or_default(),
                pronunciation: pronunciation.unwrap_or_default(),
                example: example.unwrap_or_default(),
                language_code: lang,
            };
            let inserted = vocab.insert_new(&[item])?;

            if json {
                print_json(serde_json::json!({ "inserted": inserted }))?;
            } else if inserted == 0 {
                println!("'{}' is already in the bank.", word);
            } else {
                println!("Added '{}'. First review tomorrow.", word);
            }
        }

        VocabCommands::Toggle { word, lang } => {
            let found = vocab.toggle_mastery(&word, &lang)?;
            if json {
                print_json(serde_json::json!({ "toggled": found }))?;
            } else if found {
                println!("Toggled mastery for '{}'.", word);
            } else {
                println!("Word not found.");
            }
        }

        VocabCommands::Review {
            words,
            lang,
            outcome,
        } => {
            let outcome = ReviewOutcome::from_str(&outcome).ok_or_else(|| {
                Error::InvalidArgument(format!("outcome '{}'. Use: success or fail", outcome))
            })?;
            let updated = vocab.apply_review_outcomes(&words, &lang, outcome.is_success())?;
            if json {
                print_json(serde_json::json!({ "updated": updated }))?;
            } else {
                println!("Recorded {} for {} word(s).", outcome.as_str(), updated);
            }
        }

        VocabCommands::Master { words, lang, unset } => {
            let updated = vocab.set_mastery_bulk(&words, &lang, !unset)?;
            if json {
                print_json(serde_json::json!({ "updated": updated }))?;
            } else {
                println!("Updated {} word(s).", updated);
            }
        }

        VocabCommands::Next { lang } => {
            let next = vocab.next_due(&lang)?;
            if json {
                print_json(&next)?;
            } else if let Some(e) = next {
                println!("=== Next Word to Review ===");
                println!();
                println!("Word: {}", e.word);
                if !e.pronunciation.is_empty() {
                    println!("Sounds like: {}", e.pronunciation);
                }
                println!("Meaning: {}", e.translation);
                if !e.example.is_empty() {
                    println!("Example: {}", e.example);
                }
                println!();
                println!("After review, record outcome with:");
                println!(
                    "  vocabank vocab review '{}' --lang {} --outcome <success|fail>",
                    e.word, e.language_code
                );
            } else {
                println!("No words due for review.");
            }
        }
    }

    Ok(())
}

fn print_entries(entries: &[VocabEntry], json: bool, empty: &str) -> Result<()> {
    if json {
        return print_json(entries);
    }
    if entries.is_empty() {
        println!("{}", empty);
        return Ok(());
    }

    let now = Utc::now();
    println!("{:<5} {:<24} {:<24} STATUS", "LANG", "WORD", "MEANING");
    println!("{}", "-".repeat(75));
    for e in entries {
        let status = if e.mastered {
            format!("Mastered • {}", e.review_label(now))
        } else {
            e.review_label(now).to_string()
        };
        println!(
            "{:<5} {:<24} {:<24} {}",
            e.language_code,
            truncate(&e.word, 22),
            truncate(&e.translation, 22),
            status
        );
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
