use std::env;
use std::time::Duration;

use serde::Serialize;

use crate::error::ServiceError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Everything the summarization pipeline consumes.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub primary_model_id: String,
    pub fallback_model_id: String,
    pub chunk_char_budget: usize,
    pub per_chunk_token_budget: u32,
    pub merge_token_budget: u32,
    pub token_budget_ceiling: u32,
    pub max_summary_words: usize,
    pub request_timeout: Duration,
    pub transient_retry_delay: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            primary_model_id: "gemini-2.5-pro".to_string(),
            fallback_model_id: "gemini-2.5-flash".to_string(),
            chunk_char_budget: 7000,
            per_chunk_token_budget: 700,
            merge_token_budget: 1200,
            token_budget_ceiling: 2048,
            max_summary_words: 400,
            request_timeout: Duration::from_secs(60),
            transient_retry_delay: Duration::from_millis(400),
        }
    }
}

impl SummaryConfig {
    /// Build from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: env_opt("GEMINI_API_KEY"),
            api_base_url: env_or("GEMINI_BASE_URL", &d.api_base_url),
            primary_model_id: env_or("PRIMARY_MODEL", &d.primary_model_id),
            fallback_model_id: env_or("FALLBACK_MODEL", &d.fallback_model_id),
            chunk_char_budget: env_parse("CHUNK_CHAR_BUDGET", d.chunk_char_budget),
            per_chunk_token_budget: env_parse("PER_CHUNK_TOKEN_BUDGET", d.per_chunk_token_budget),
            merge_token_budget: env_parse("MERGE_TOKEN_BUDGET", d.merge_token_budget),
            token_budget_ceiling: env_parse("TOKEN_BUDGET_CEILING", d.token_budget_ceiling),
            max_summary_words: env_parse("MAX_SUMMARY_WORDS", d.max_summary_words),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 60)),
            transient_retry_delay: Duration::from_millis(env_parse(
                "TRANSIENT_RETRY_DELAY_MS",
                400,
            )),
        }
    }

    pub fn require_api_key(&self) -> Result<&str, ServiceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Config("GEMINI_API_KEY not set".into()))
    }
}

/// Feed download settings.
#[derive(Debug, Clone, Serialize)]
pub struct FeedConfig {
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    /// Upper bound on the time spent retrying a single feed.
    pub retry_window: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            fetch_timeout: Duration::from_secs(10),
            retry_window: Duration::from_secs(20),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            concurrency: env_parse("FEED_CONCURRENCY", d.concurrency).max(1),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 10)),
            retry_window: d.retry_window,
        }
    }
}
