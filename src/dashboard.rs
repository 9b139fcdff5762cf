use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{AccountOverview, Finance, MonthWindow, MonthlySummary};

/// What the overview page renders for one month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub summary: MonthlySummary,
    pub accounts: AccountOverview,
}

/// Ticket for one refresh. Only the most recently issued token may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken {
    generation: u64,
    window: MonthWindow,
}

impl RefreshToken {
    pub fn window(&self) -> &MonthWindow {
        &self.window
    }
}

/// Selected month plus the last snapshot published for it.
pub struct Dashboard {
    finance: Finance,
    generation: AtomicU64,
    selected: Mutex<MonthWindow>,
    current: Mutex<Option<Arc<DashboardSnapshot>>>,
}

impl Dashboard {
    pub fn new(finance: Finance, window: MonthWindow) -> Self {
        Self {
            finance,
            generation: AtomicU64::new(0),
            selected: Mutex::new(window),
            current: Mutex::new(None),
        }
    }

    pub fn selected(&self) -> MonthWindow {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select `window` and invalidate every refresh still in flight.
    pub fn select(&self, window: MonthWindow) -> RefreshToken {
        let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        *selected = window;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RefreshToken { generation, window }
    }

    /// Move the selection by `delta` months.
    pub fn navigate(&self, delta: i32) -> RefreshToken {
        let window = self.selected().shift(delta);
        self.select(window)
    }

    /// Token for re-reading the selected month.
    pub fn refresh_token(&self) -> RefreshToken {
        self.select(self.selected())
    }

    pub fn is_current(&self, token: &RefreshToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.generation
    }

    /// Read the token's month and publish it, unless a newer token was
    /// issued in the meantime.
    pub async fn load(&self, token: RefreshToken) -> Option<Arc<DashboardSnapshot>> {
        let (summary, accounts) = tokio::join!(
            self.finance.summary_for(&token.window),
            self.finance.account_overview()
        );

        self.publish(token, DashboardSnapshot { summary, accounts })
    }

    /// Store `snapshot` as current if `token` is still the newest.
    pub fn publish(
        &self,
        token: RefreshToken,
        snapshot: DashboardSnapshot,
    ) -> Option<Arc<DashboardSnapshot>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(&token) {
            tracing::debug!(
                month = token.window.month(),
                year = token.window.year(),
                "dropping stale dashboard refresh"
            );
            return None;
        }

        let snapshot = Arc::new(snapshot);
        *current = Some(Arc::clone(&snapshot));
        Some(snapshot)
    }

    pub fn current(&self) -> Option<Arc<DashboardSnapshot>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
