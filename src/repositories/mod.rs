pub mod file_repo;
pub mod redis_repo;
pub mod sqlite_repo;

pub use file_repo::*;
pub use redis_repo::*;
pub use sqlite_repo::*;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::UsageState;

/// Durable home for the daily usage record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<UsageState>>;

    async fn save(&self, state: &UsageState) -> Result<()>;

    fn backend(&self) -> &'static str;
}
