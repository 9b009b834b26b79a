use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::UsageState;
use crate::repositories::UsageStore;

/// Result items the service will process per UTC day.
pub const DAILY_LIMIT: u64 = 10_000;

/// Usage was counted in memory but could not be written to the store.
#[derive(Debug, Error)]
#[error("failed to persist usage to {backend} store: {cause:#}")]
pub struct PersistError {
    pub remaining: i64,
    pub backend: &'static str,
    pub cause: anyhow::Error,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct QuotaService {
    state: Arc<Mutex<UsageState>>,
    store: Arc<dyn UsageStore>,
    daily_limit: u64,
}

impl QuotaService {
    /// Loads the persisted record, starting from zero when it is missing or unreadable.
    pub async fn load(store: Arc<dyn UsageStore>, daily_limit: u64) -> Self {
        Self::load_at(store, daily_limit, today()).await
    }

    async fn load_at(store: Arc<dyn UsageStore>, daily_limit: u64, today: NaiveDate) -> Self {
        let state = match store.load().await {
            Ok(Some(state)) => {
                info!(
                    backend = store.backend(),
                    date = %state.date,
                    count = state.count,
                    "Loaded usage record"
                );
                state
            }
            Ok(None) => {
                info!(backend = store.backend(), "No usage record found, starting fresh");
                UsageState::fresh(today)
            }
            Err(e) => {
                warn!(backend = store.backend(), "Failed to load usage record: {:#}", e);
                UsageState::fresh(today)
            }
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            daily_limit,
        }
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    pub async fn current_state(&self) -> UsageState {
        self.current_state_at(today()).await
    }

    pub async fn has_capacity(&self) -> bool {
        self.has_capacity_at(today()).await
    }

    /// Adds `n` consumed items and returns what is left of today's budget.
    ///
    /// The returned value may be negative. The in-memory count is updated even
    /// when persisting fails; the error still carries the remaining budget.
    pub async fn record_usage(&self, n: u64) -> Result<i64, PersistError> {
        self.record_usage_at(n, today()).await
    }

    async fn current_state_at(&self, today: NaiveDate) -> UsageState {
        let mut state = self.state.lock().await;
        roll_over(&mut state, today);
        *state
    }

    async fn has_capacity_at(&self, today: NaiveDate) -> bool {
        let mut state = self.state.lock().await;
        roll_over(&mut state, today);
        state.count < self.daily_limit
    }

    async fn record_usage_at(&self, n: u64, today: NaiveDate) -> Result<i64, PersistError> {
        let mut state = self.state.lock().await;
        roll_over(&mut state, today);
        state.count = state.count.saturating_add(n);
        let remaining = self.daily_limit as i64 - state.count as i64;

        // The lock stays held across the write so concurrent requests persist in order.
        self.store
            .save(&state)
            .await
            .map_err(|cause| PersistError {
                remaining,
                backend: self.store.backend(),
                cause,
            })?;

        debug!(count = state.count, remaining, "Recorded usage");
        Ok(remaining)
    }
}

fn roll_over(state: &mut UsageState, today: NaiveDate) {
    if state.date != today {
        debug!(previous = %state.date, %today, "Resetting daily usage");
        *state = UsageState::fresh(today);
    }
}
