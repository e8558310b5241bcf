// chat-summaries/crates/chat-summaries/src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::memory::ChatRole;
use crate::memory_db::SummaryLevel;

/// Language used for segment labels, prompt headers and fallback markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    English,
    Korean,
}

impl Locale {
    pub fn summary_label(&self, level: SummaryLevel) -> &'static str {
        match (self, level) {
            (Locale::English, SummaryLevel::Meta) => "meta summary",
            (Locale::English, SummaryLevel::Chunk) => "summary",
            (Locale::Korean, SummaryLevel::Meta) => "메타 요약",
            (Locale::Korean, SummaryLevel::Chunk) => "요약",
        }
    }

    pub fn summary_header(&self) -> &'static str {
        match self {
            Locale::English => "=== Prior conversation summary ===",
            Locale::Korean => "=== 이전 대화 요약 ===",
        }
    }

    pub fn speaker(&self, role: ChatRole) -> &'static str {
        match (self, role) {
            (_, ChatRole::Assistant) => "AI",
            (Locale::English, ChatRole::User) => "User",
            (Locale::Korean, ChatRole::User) => "사용자",
            (Locale::English, ChatRole::System) => "System",
            (Locale::Korean, ChatRole::System) => "시스템",
        }
    }

    pub fn chunk_fallback_marker(&self) -> &'static str {
        match self {
            Locale::English => "summary failed - recent highlights:",
            Locale::Korean => "요약 실패 – 최근 대화 하이라이트:",
        }
    }

    pub fn meta_fallback_marker(&self) -> &'static str {
        match self {
            Locale::English => "summary failed - refer to the chunk summaries as-is:",
            Locale::Korean => "요약 실패 – 기존 청크 요약을 그대로 참조하세요:",
        }
    }
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Locale::English),
            "ko" | "korean" => Ok(Locale::Korean),
            other => Err(anyhow::anyhow!("Unsupported locale: {}", other)),
        }
    }
}

/// Sizes and limits that shape summarization. Immutable once handed to the
/// builder and updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub context_window: usize,
    pub chunk_size: usize,
    /// Trailing messages that are never eligible for chunking. Defaults to
    /// `context_window`, so a chunk never covers a message that is still
    /// sent verbatim. Setting it to `chunk_size` chunks one chunk earlier.
    pub chunk_reserve: usize,
    pub summary_group_size: usize,
    pub message_char_limit: usize,
    pub chunk_summary_max_tokens: u32,
    pub meta_summary_max_tokens: u32,
    pub fallback_char_limit: usize,
    pub fallback_recent_messages: usize,
    pub fallback_message_chars: usize,
    pub fallback_chunk_chars: usize,
    pub locale: Locale,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            context_window: 20,
            chunk_size: 10,
            chunk_reserve: 20,
            summary_group_size: 10,
            message_char_limit: 1200,
            chunk_summary_max_tokens: 2048,
            meta_summary_max_tokens: 3072,
            fallback_char_limit: 700,
            fallback_recent_messages: 5,
            fallback_message_chars: 140,
            fallback_chunk_chars: 160,
            locale: Locale::English,
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("context_window", self.context_window),
            ("chunk_size", self.chunk_size),
            ("summary_group_size", self.summary_group_size),
            ("message_char_limit", self.message_char_limit),
            ("fallback_char_limit", self.fallback_char_limit),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(anyhow::anyhow!("{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// Messages needed before the updater does any work at all.
    pub fn min_messages_for_summary(&self) -> usize {
        self.chunk_size * 2
    }

    fn apply_env_overrides(mut self) -> Result<Self> {
        self.context_window = env_or("CONTEXT_WINDOW", self.context_window)?;
        self.chunk_size = env_or("CHUNK_SIZE", self.chunk_size)?;
        self.chunk_reserve = env_or("CHUNK_RESERVE", self.context_window)?;
        self.summary_group_size = env_or("SUMMARY_GROUP_SIZE", self.summary_group_size)?;
        self.locale = env_or("SUMMARY_LOCALE", self.locale)?;
        self.validate()?;
        Ok(self)
    }
}

/// Runtime configuration for the binary and for embedders that want the
/// SQLite store plus the HTTP text generator.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub backend_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub generate_timeout_seconds: u64,
    pub summary: SummaryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_path = env::var("SUMMARY_DB_PATH")
            .unwrap_or_else(|_| "./data/chat_summaries.db".into())
            .into();
        let backend_url = env::var("LLM_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8081".into())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_path,
            backend_url,
            model_name: env::var("LLM_MODEL").unwrap_or_else(|_| "local-llm".into()),
            api_key: env::var("LLM_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            generate_timeout_seconds: env_or("GENERATE_TIMEOUT_SECONDS", 120)?,
            summary: SummaryConfig::default().apply_env_overrides()?,
        })
    }

    pub fn print_config(&self) {
        info!("Configuration:");
        info!("- Database: {}", self.database_path.display());
        info!("- Backend URL: {}", self.backend_url);
        info!("- Model: {}", self.model_name);
        info!("- API key: {}", if self.api_key.is_some() { "set" } else { "not set" });
        info!("- Generate Timeout: {}s", self.generate_timeout_seconds);
        info!(
            "- Summary sizes: window {}, chunk {}, reserve {}, group {}",
            self.summary.context_window,
            self.summary.chunk_size,
            self.summary.chunk_reserve,
            self.summary.summary_group_size
        );
        info!("- Locale: {:?}", self.summary.locale);
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}
