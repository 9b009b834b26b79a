use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::UsageState;
use crate::repositories::UsageStore;

/// Keeps the usage record as a JSON string under a single key.
#[derive(Clone)]
pub struct RedisUsageRepo {
    manager: ConnectionManager,
    key: String,
}

impl RedisUsageRepo {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            key: key.into(),
        })
    }
}

#[async_trait]
impl UsageStore for RedisUsageRepo {
    async fn load(&self) -> Result<Option<UsageState>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(&self.key).await?;
        value
            .map(|raw| {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt usage record under key {}", self.key))
            })
            .transpose()
    }

    async fn save(&self, state: &UsageState) -> Result<()> {
        let mut conn = self.manager.clone();
        let json = serde_json::to_string(state)?;
        conn.set::<_, _, ()>(&self.key, json).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
