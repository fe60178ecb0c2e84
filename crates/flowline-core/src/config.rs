use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_POOL_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LEASE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
pub const DEFAULT_CIRCUIT_BREAKER_WINDOW_SECS: u64 = 60;
pub const DEFAULT_FALLBACK_REPLY: &str =
    "I'm having trouble answering right now. Please try again.";

/// Compiled-in template content used when a stage's own template is
/// missing (deleted out from under it) *and* the business has configured
/// no `default_stage_selection` template of its own — the last tier of
/// §4.7 Phase 1 step 1's fallback chain.
pub const DEFAULT_STAGE_SELECTION_TEMPLATE: &str =
    "Given the available stages: {{available_stages}}\nand the message: {{user_message}}\nreply with the single best matching stage name.";

/// Top-level config (flowline.toml + FLOWLINE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowlineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub master_api_key: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for FlowlineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            master_api_key: "change-me".to_string(),
            llm: LlmConfig::default(),
            platforms: PlatformsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_pool_acquire_timeout_ms")]
    pub pool_acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            pool_acquire_timeout_ms: default_pool_acquire_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
    /// When true (or when api_key is absent), use the in-process mock client.
    #[serde(default)]
    pub mock: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_ms: default_llm_timeout_ms(),
            mock: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformsConfig {
    pub facebook_secret: Option<String>,
    pub whatsapp_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_admin_writes_per_min")]
    pub admin_writes_per_min: u32,
    #[serde(default = "default_message_ingress_per_min")]
    pub message_ingress_per_min: u32,
    #[serde(default = "default_global_per_day")]
    pub global_per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            admin_writes_per_min: default_admin_writes_per_min(),
            message_ingress_per_min: default_message_ingress_per_min(),
            global_per_day: default_global_per_day(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_log_level() -> String {
    "flowline_gateway=info,tower_http=info".to_string()
}
fn default_db_path() -> String {
    "./flowline.db".to_string()
}
fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}
fn default_pool_acquire_timeout_ms() -> u64 {
    DEFAULT_POOL_ACQUIRE_TIMEOUT_MS
}
fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_ms() -> u64 {
    DEFAULT_LLM_TIMEOUT_MS
}
fn default_admin_writes_per_min() -> u32 {
    10
}
fn default_message_ingress_per_min() -> u32 {
    30
}
fn default_global_per_day() -> u32 {
    100
}

impl FlowlineConfig {
    /// Load config from a TOML file with FLOWLINE_* env var overrides.
    ///
    /// Checks in order: explicit path argument, then `./flowline.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("./flowline.toml");

        let config: FlowlineConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FLOWLINE_").split("__"))
            .extract()
            .map_err(|e| crate::error::FlowlineError::Config(e.to_string()))?;

        Ok(config)
    }
}
