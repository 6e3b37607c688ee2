use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::dialogue::DialogueSettings;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorKind {
    Scripted,
    Claude,
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub static_dir: PathBuf,
    pub tutor: TutorKind,
    pub anthropic: AnthropicConfig,
    pub dialogue: DialogueSettings,
}

impl Config {
    /// Read configuration from the process environment (after `.env` has
    /// been loaded by the caller).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tutor = match lookup("PROMPTLAB_TUTOR").as_deref() {
            None | Some("scripted") => TutorKind::Scripted,
            Some("claude") => TutorKind::Claude,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "PROMPTLAB_TUTOR",
                    value: other.to_string(),
                })
            }
        };

        let api_key = lookup("ANTHROPIC_API_KEY").filter(|key| !key.is_empty());
        if tutor == TutorKind::Claude && api_key.is_none() {
            return Err(ConfigError::Missing("ANTHROPIC_API_KEY"));
        }

        let min_student_turns = parse_or(&lookup, "PROMPTLAB_MIN_STUDENT_TURNS", 3usize)?;
        if min_student_turns == 0 {
            return Err(ConfigError::Invalid {
                name: "PROMPTLAB_MIN_STUDENT_TURNS",
                value: "0".into(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            static_dir: lookup("PROMPTLAB_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("frontend/out")),
            tutor,
            anthropic: AnthropicConfig {
                api_key,
                model: lookup("ANTHROPIC_MODEL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                base_url: lookup("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "PROMPTLAB_AI_TIMEOUT_SECS", 60)?),
            },
            dialogue: DialogueSettings { min_student_turns },
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
