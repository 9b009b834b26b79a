use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::services::quota_service::DAILY_LIMIT;

pub const DEFAULT_SEARCH_API_URL: &str = "https://www.googleapis.com/customsearch/v1";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchSettings,
    pub pipeline: PipelineSettings,
    pub quota: QuotaSettings,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub engine_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Toggles for the enrichment stages applied to every search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub extract_metadata: bool,
    pub scrape_headings: bool,
    pub scrape_timeout_secs: u64,
    pub scrape_user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Sqlite,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "redis" => Ok(StoreBackend::Redis),
            other => anyhow::bail!("unknown quota store backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSettings {
    pub daily_limit: u64,
    pub store: StoreBackend,
    pub file_path: String,
    pub sqlite_path: String,
    pub redis_url: String,
    pub redis_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: num_cpus::get(),
            },
            search: SearchSettings {
                api_key: String::new(),
                engine_id: String::new(),
                base_url: DEFAULT_SEARCH_API_URL.to_string(),
                timeout_secs: 15,
            },
            pipeline: PipelineSettings {
                extract_metadata: true,
                scrape_headings: true,
                scrape_timeout_secs: 10,
                scrape_user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            quota: QuotaSettings {
                daily_limit: DAILY_LIMIT,
                store: StoreBackend::File,
                file_path: "usage_tracker.json".to_string(),
                sqlite_path: "data/usage.db".to_string(),
                redis_url: String::new(),
                redis_key: "search_og_proxy:usage".to_string(),
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        // Server configuration
        if let Ok(host) = env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.server.port = port.parse().context("PORT")?;
        }
        if let Ok(workers) = env::var("WORKERS") {
            config.server.workers = workers.parse().context("WORKERS")?;
        }

        // Search provider configuration
        config.search.api_key = env::var("GOOGLE_API_KEY").context("GOOGLE_API_KEY must be set")?;
        config.search.engine_id = env::var("GOOGLE_CSE_ID").context("GOOGLE_CSE_ID must be set")?;
        if let Ok(base_url) = env::var("SEARCH_API_URL") {
            config.search.base_url = base_url;
        }
        if let Ok(timeout) = env::var("SEARCH_TIMEOUT_SECS") {
            config.search.timeout_secs = timeout.parse().context("SEARCH_TIMEOUT_SECS")?;
        }

        // Pipeline configuration
        if let Ok(extract) = env::var("EXTRACT_METADATA") {
            config.pipeline.extract_metadata = extract.parse().context("EXTRACT_METADATA")?;
        }
        if let Ok(scrape) = env::var("SCRAPE_HEADINGS") {
            config.pipeline.scrape_headings = scrape.parse().context("SCRAPE_HEADINGS")?;
        }
        if let Ok(timeout) = env::var("SCRAPE_TIMEOUT_SECS") {
            config.pipeline.scrape_timeout_secs = timeout.parse().context("SCRAPE_TIMEOUT_SECS")?;
        }
        if let Ok(user_agent) = env::var("SCRAPE_USER_AGENT") {
            config.pipeline.scrape_user_agent = user_agent;
        }

        // Quota configuration
        if let Ok(limit) = env::var("QUOTA_DAILY_LIMIT") {
            config.quota.daily_limit = limit.parse().context("QUOTA_DAILY_LIMIT")?;
        }
        if let Ok(store) = env::var("QUOTA_STORE") {
            config.quota.store = store.parse()?;
        }
        if let Ok(path) = env::var("QUOTA_FILE_PATH") {
            config.quota.file_path = path;
        }
        if let Ok(path) = env::var("QUOTA_SQLITE_PATH") {
            config.quota.sqlite_path = path;
        }
        if let Ok(redis_url) = env::var("QUOTA_REDIS_URL") {
            config.quota.redis_url = redis_url;
        }
        if let Ok(redis_key) = env::var("QUOTA_REDIS_KEY") {
            config.quota.redis_key = redis_key;
        }

        // Security configuration
        if let Ok(allowed_origins) = env::var("ALLOWED_ORIGINS") {
            config.security.allowed_origins = allowed_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .collect();
        }

        Ok(config)
    }
}
