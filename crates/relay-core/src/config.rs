use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::SourceTopicId, errors::Error, Result};

/// A chat as written in configuration: numeric id or public `@username`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{id}"),
            ChatRef::Username(name) => f.write_str(name),
        }
    }
}

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub source_chat: ChatRef,
    pub destination_chat: ChatRef,
    pub ignored_topics: Vec<SourceTopicId>,

    // Storage
    pub mappings_dir: PathBuf,
    pub downloads_dir: PathBuf,

    // Telegram limits
    pub telegram_message_limit: usize,
    pub telegram_safe_limit: usize,
    pub telegram_caption_limit: usize,
}

impl Config {
    /// Load from the process environment (after `.env`, which never overrides).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;

        fs::create_dir_all(&cfg.downloads_dir)?;
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup. No side effects.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let source_chat = lookup("SOURCE_CHAT")
            .and_then(|v| parse_chat_ref(&v))
            .ok_or_else(|| {
                Error::Config("SOURCE_CHAT environment variable is required".to_string())
            })?;
        let destination_chat = lookup("DESTINATION_CHAT")
            .and_then(|v| parse_chat_ref(&v))
            .ok_or_else(|| {
                Error::Config("DESTINATION_CHAT environment variable is required".to_string())
            })?;

        let ignored_topics = parse_topic_list(lookup("IGNORED_TOPICS").as_deref())?;

        let mappings_dir =
            PathBuf::from(lookup("MAPPINGS_DIR").unwrap_or_else(|| "./mappings".to_string()));
        let downloads_dir =
            PathBuf::from(lookup("DOWNLOADS_DIR").unwrap_or_else(|| "./downloads".to_string()));

        let telegram_message_limit = parse_usize(&lookup, "TELEGRAM_MESSAGE_LIMIT", 4096)?;
        let telegram_safe_limit = parse_usize(&lookup, "TELEGRAM_SAFE_LIMIT", 4000)?;
        let telegram_caption_limit = parse_usize(&lookup, "TELEGRAM_CAPTION_LIMIT", 1024)?;
        if telegram_safe_limit == 0 || telegram_safe_limit >= telegram_message_limit {
            return Err(Error::Config(format!(
                "TELEGRAM_SAFE_LIMIT ({telegram_safe_limit}) must be between 1 and TELEGRAM_MESSAGE_LIMIT ({telegram_message_limit})"
            )));
        }

        Ok(Self {
            telegram_bot_token,
            source_chat,
            destination_chat,
            ignored_topics,
            mappings_dir,
            downloads_dir,
            telegram_message_limit,
            telegram_safe_limit,
            telegram_caption_limit,
        })
    }
}

/// `-100123`, `"-100123"`, `@name` or `name` → chat reference; blank → `None`.
pub fn parse_chat_ref(raw: &str) -> Option<ChatRef> {
    let v = strip_quotes(raw.trim());
    if v.is_empty() {
        return None;
    }
    if let Ok(id) = v.parse::<i64>() {
        return Some(ChatRef::Id(id));
    }
    let name = v.trim_start_matches('@');
    Some(ChatRef::Username(format!("@{name}")))
}

/// Comma-separated topic ids; each entry may be quoted. Blank entries are skipped.
pub fn parse_topic_list(raw: Option<&str>) -> Result<Vec<SourceTopicId>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    strip_quotes(raw.trim())
        .split(',')
        .map(|s| strip_quotes(s.trim()))
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map(SourceTopicId)
                .map_err(|_| Error::Config(format!("IGNORED_TOPICS: invalid topic id {s:?}")))
        })
        .collect()
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> Result<usize> {
    match lookup(key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::Config(format!("{key}: expected a positive integer, got {v:?}"))),
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return s[1..s.len() - 1].trim();
    }
    s
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v));
    }
}
