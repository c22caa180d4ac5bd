use std::path::PathBuf;

pub const DEFAULT_DB_NAME: &str = "vocabank.db";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const DB_ENV: &str = "VOCABANK_DB";
const LOG_ENV: &str = "VOCABANK_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Command line flag, then environment, then defaults.
    pub fn resolve(db_flag: Option<PathBuf>) -> Self {
        Self::from_lookup(db_flag, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(db_flag: Option<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = db_flag
            .or_else(|| lookup(DB_ENV).filter(|p| !p.is_empty()).map(PathBuf::from))
            .unwrap_or_else(default_db_path);

        let log_level = lookup(LOG_ENV)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Self { db_path, log_level }
    }
}

fn default_db_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vocabank")
        .join(DEFAULT_DB_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = Config::from_lookup(None, lookup(&[]));
        assert!(config.db_path.ends_with("vocabank/vocabank.db"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::from_lookup(
            None,
            lookup(&[("VOCABANK_DB", "/tmp/test_vocabank.db"), ("VOCABANK_LOG", "debug")]),
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/test_vocabank.db"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn flag_overrides_env() {
        let config = Config::from_lookup(
            Some(PathBuf::from("/srv/bank.db")),
            lookup(&[("VOCABANK_DB", "/tmp/test_vocabank.db")]),
        );
        assert_eq!(config.db_path, PathBuf::from("/srv/bank.db"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config =
            Config::from_lookup(None, lookup(&[("VOCABANK_DB", ""), ("VOCABANK_LOG", "")]));
        assert!(config.db_path.ends_with(DEFAULT_DB_NAME));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }
}
