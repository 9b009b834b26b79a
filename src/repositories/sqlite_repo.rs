use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::PathBuf;

use crate::models::UsageState;
use crate::repositories::UsageStore;

#[derive(Clone)]
pub struct SqliteUsageRepo {
    path: PathBuf,
}

impl SqliteUsageRepo {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create sqlite usage directory: {}", parent.display())
            })?;
        }
        let repo = Self { path };
        repo.init()?;
        Ok(repo)
    }

    fn init(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS usage_tracker (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                date TEXT NOT NULL,
                count INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    fn get(&self) -> Result<Option<UsageState>> {
        let conn = Connection::open(&self.path)?;
        let row = conn
            .query_row(
                "SELECT date, count FROM usage_tracker WHERE id = 1",
                [],
                |row| Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(date, count)| UsageState {
            date,
            count: count.max(0) as u64,
        }))
    }

    fn put(&self, state: &UsageState) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            "INSERT INTO usage_tracker (id, date, count, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                date = excluded.date,
                count = excluded.count,
                updated_at = excluded.updated_at",
            params![state.date, state.count as i64, Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl UsageStore for SqliteUsageRepo {
    async fn load(&self) -> Result<Option<UsageState>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.get()).await?
    }

    async fn save(&self, state: &UsageState) -> Result<()> {
        let repo = self.clone();
        let state = *state;
        tokio::task::spawn_blocking(move || repo.put(&state)).await?
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
