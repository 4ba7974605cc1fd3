use serde::Serialize;

mod env;

pub use env::parse_env_bool;
use env::{read_env_u16, read_env_u32, read_env_u64, read_env_usize, read_non_empty_env};

const ENV_TOPIC_MIN_MENTIONS: &str = "ONTOSCOPE_TOPIC_MIN_MENTIONS";
const ENV_TOPIC_MIN_DISTINCT_POSTS: &str = "ONTOSCOPE_TOPIC_MIN_DISTINCT_POSTS";
const ENV_TOPIC_MENTION_SCAN_LIMIT: &str = "ONTOSCOPE_TOPIC_MENTION_SCAN_LIMIT";
const ENV_NARRATIVE_MIN_FACTS: &str = "ONTOSCOPE_NARRATIVE_MIN_FACTS";
const ENV_NARRATIVE_EXPIRY_DAYS: &str = "ONTOSCOPE_NARRATIVE_EXPIRY_DAYS";
const ENV_CHANGED_ASPECT_MIN_DELTA_MILLI: &str = "ONTOSCOPE_CHANGED_ASPECT_MIN_DELTA_MILLI";
const ENV_LEASE_TTL_SECS: &str = "ONTOSCOPE_LEASE_TTL_SECS";
const ENV_NARRATIVE_LLM_ENDPOINT: &str = "ONTOSCOPE_NARRATIVE_LLM_ENDPOINT";
const ENV_NARRATIVE_LLM_MODEL: &str = "ONTOSCOPE_NARRATIVE_LLM_MODEL";
const ENV_NARRATIVE_LLM_TIMEOUT_MS: &str = "ONTOSCOPE_NARRATIVE_LLM_TIMEOUT_MS";
const ENV_NARRATIVE_LLM_MAX_OUTPUT_TOKENS: &str = "ONTOSCOPE_NARRATIVE_LLM_MAX_OUTPUT_TOKENS";
const ENV_NARRATIVE_LLM_TEMPERATURE_MILLI: &str = "ONTOSCOPE_NARRATIVE_LLM_TEMPERATURE_MILLI";

const DEFAULT_TOPIC_MIN_MENTIONS: usize = 3;
const DEFAULT_TOPIC_MIN_DISTINCT_POSTS: usize = 2;
const DEFAULT_TOPIC_MENTION_SCAN_LIMIT: usize = 100;
const DEFAULT_NARRATIVE_MIN_FACTS: usize = 2;
const DEFAULT_NARRATIVE_EXPIRY_DAYS: u64 = 30;
const DEFAULT_CHANGED_ASPECT_MIN_DELTA_MILLI: u64 = 100;
const DEFAULT_LEASE_TTL_SECS: u64 = 3_600;
pub const DEFAULT_NARRATIVE_LLM_ENDPOINT: &str = "http://127.0.0.1:11434/api/chat";
pub const DEFAULT_NARRATIVE_LLM_MODEL: &str = "qwen2.5:7b-instruct";
const DEFAULT_NARRATIVE_LLM_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_NARRATIVE_LLM_MAX_OUTPUT_TOKENS: u32 = 600;
const DEFAULT_NARRATIVE_LLM_TEMPERATURE_MILLI: u16 = 300;

/// Engine tuning snapshot. Read once per process from `ONTOSCOPE_*` variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub topics: TopicPromotionConfig,
    pub narrative: NarrativeConfig,
    /// Absolute aspect sentiment change listed under `top_changed_aspects`.
    pub changed_aspect_min_delta: f64,
    pub lease_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopicPromotionConfig {
    pub min_mentions: usize,
    pub min_distinct_posts: usize,
    pub mention_scan_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeConfig {
    pub min_facts: usize,
    pub expiry_days: u64,
    pub llm: NarrativeLlmConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeLlmConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_output_tokens: u32,
    pub temperature_milli: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topics: TopicPromotionConfig::default(),
            narrative: NarrativeConfig::default(),
            changed_aspect_min_delta: milli_to_f64(DEFAULT_CHANGED_ASPECT_MIN_DELTA_MILLI),
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
        }
    }
}

impl Default for TopicPromotionConfig {
    fn default() -> Self {
        Self {
            min_mentions: DEFAULT_TOPIC_MIN_MENTIONS,
            min_distinct_posts: DEFAULT_TOPIC_MIN_DISTINCT_POSTS,
            mention_scan_limit: DEFAULT_TOPIC_MENTION_SCAN_LIMIT,
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            min_facts: DEFAULT_NARRATIVE_MIN_FACTS,
            expiry_days: DEFAULT_NARRATIVE_EXPIRY_DAYS,
            llm: NarrativeLlmConfig::default(),
        }
    }
}

impl Default for NarrativeLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_NARRATIVE_LLM_ENDPOINT.to_string(),
            model: DEFAULT_NARRATIVE_LLM_MODEL.to_string(),
            timeout_ms: DEFAULT_NARRATIVE_LLM_TIMEOUT_MS,
            max_output_tokens: DEFAULT_NARRATIVE_LLM_MAX_OUTPUT_TOKENS,
            temperature_milli: DEFAULT_NARRATIVE_LLM_TEMPERATURE_MILLI,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            topics: TopicPromotionConfig::from_env(),
            narrative: NarrativeConfig::from_env(),
            changed_aspect_min_delta: milli_to_f64(
                read_env_u64(ENV_CHANGED_ASPECT_MIN_DELTA_MILLI)
                    .unwrap_or(DEFAULT_CHANGED_ASPECT_MIN_DELTA_MILLI),
            ),
            lease_ttl_secs: read_env_u64(ENV_LEASE_TTL_SECS)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_LEASE_TTL_SECS),
        }
    }
}

impl TopicPromotionConfig {
    fn from_env() -> Self {
        Self {
            min_mentions: read_env_usize(ENV_TOPIC_MIN_MENTIONS, DEFAULT_TOPIC_MIN_MENTIONS, 1),
            min_distinct_posts: read_env_usize(
                ENV_TOPIC_MIN_DISTINCT_POSTS,
                DEFAULT_TOPIC_MIN_DISTINCT_POSTS,
                1,
            ),
            mention_scan_limit: read_env_usize(
                ENV_TOPIC_MENTION_SCAN_LIMIT,
                DEFAULT_TOPIC_MENTION_SCAN_LIMIT,
                1,
            ),
        }
    }
}

impl NarrativeConfig {
    fn from_env() -> Self {
        Self {
            min_facts: read_env_usize(ENV_NARRATIVE_MIN_FACTS, DEFAULT_NARRATIVE_MIN_FACTS, 1),
            expiry_days: read_env_u64(ENV_NARRATIVE_EXPIRY_DAYS)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_NARRATIVE_EXPIRY_DAYS),
            llm: NarrativeLlmConfig::from_env(),
        }
    }
}

impl NarrativeLlmConfig {
    fn from_env() -> Self {
        Self {
            endpoint: read_non_empty_env(ENV_NARRATIVE_LLM_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_NARRATIVE_LLM_ENDPOINT.to_string()),
            model: read_non_empty_env(ENV_NARRATIVE_LLM_MODEL)
                .unwrap_or_else(|| DEFAULT_NARRATIVE_LLM_MODEL.to_string()),
            timeout_ms: read_env_u64(ENV_NARRATIVE_LLM_TIMEOUT_MS)
                .filter(|value| *value >= 200)
                .unwrap_or(DEFAULT_NARRATIVE_LLM_TIMEOUT_MS),
            max_output_tokens: read_env_u32(ENV_NARRATIVE_LLM_MAX_OUTPUT_TOKENS)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_NARRATIVE_LLM_MAX_OUTPUT_TOKENS),
            temperature_milli: read_env_u16(ENV_NARRATIVE_LLM_TEMPERATURE_MILLI)
                .unwrap_or(DEFAULT_NARRATIVE_LLM_TEMPERATURE_MILLI),
        }
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        f64::from(self.temperature_milli) / 1000.0
    }
}

#[allow(
    clippy::cast_precision_loss,
    reason = "milli settings are small integers"
)]
fn milli_to_f64(value: u64) -> f64 {
    value as f64 / 1000.0
}
