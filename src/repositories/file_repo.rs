use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use crate::models::UsageState;
use crate::repositories::UsageStore;

/// Stores the usage record as a small JSON document.
#[derive(Clone)]
pub struct FileUsageRepo {
    path: PathBuf,
}

impl FileUsageRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl UsageStore for FileUsageRepo {
    async fn load(&self) -> Result<Option<UsageState>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read usage file: {}", self.path.display())
                })
            }
        };
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt usage file: {}", self.path.display()))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &UsageState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create usage directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_vec(state)?;
        let temp = self.temp_path();
        fs::write(&temp, json)
            .await
            .with_context(|| format!("Failed to write usage file: {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace usage file: {}", self.path.display()))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}
