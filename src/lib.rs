//! # Cultivo
//!
//! Records and monthly finance rollups for a small cultivation and retail
//! shop: cash accounts and the movements against them, clients, strains in
//! stock and the sales orders drawn from them.
//!
//! Every read goes through a [`StoreAdapter`]. The crate ships an in-memory
//! adapter and a Postgres adapter (feature `postgres`, on by default).
//!
//! ## Monthly rollups
//!
//! [`Finance`] computes income, reinvestment, salary, net profit, grams sold
//! and the most active client for one calendar month. Store failures never
//! reach the caller: a failed read is logged and counts as an empty month.
//!
//! ```rust,ignore
//! let system = Cultivo::new(Box::new(MemoryAdapter::new()), Config::default());
//! let finance = system.finance();
//!
//! // January 2025, month index is zero-based
//! let summary = finance.monthly_summary(Some(0), Some(2025)).await;
//! println!("net profit: {}", summary.net_profit);
//! ```
//!
//! ## Writes
//!
//! [`Cashbox`] registers cash movements and keeps account balances in step.
//! [`Sales`] places orders: it checks stock, updates client stats and credits
//! the paying account.
//!
//! ## Dashboard
//!
//! [`Dashboard`] holds the selected month. Every navigation issues a new
//! refresh token and only the newest token may publish a snapshot, so a slow
//! response for a month the user already left is dropped.

pub mod account;
pub mod adapters;
pub mod cash;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod entry;
pub mod error;
pub mod finance;
pub mod order;
pub mod sales;
pub mod strain;
pub mod window;

pub use account::{AccountOverview, CashAccount};
pub use cash::{Cashbox, NewMovement};
pub use client::{Client, ClientUpdate, MostActiveClient};
pub use config::Config;
pub use dashboard::{Dashboard, DashboardSnapshot, RefreshToken};
pub use entry::{EntryKind, LedgerEntry};
pub use error::Error;
pub use finance::{Finance, MonthlySummary};
pub use order::{Order, OrderPlan, OrderRequest};
pub use sales::Sales;
pub use strain::{StockMovement, StockMovementKind, Strain};
pub use window::{MonthWindow, compute_month_window};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Record store behind every page.
///
/// Range reads are inclusive on both window bounds and return rows in the
/// store's natural order. Accounts are listed by name.
///
/// Writes that touch more than one record are single operations
/// (`record_movement`, `record_order`, `record_stock_movement`): the store
/// applies them atomically and checks balances and stock inside that unit,
/// so concurrent callers never overwrite each other's changes.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    // READ OPERATIONS
    async fn entries_in(&self, window: &MonthWindow) -> Result<Vec<LedgerEntry>, Error>;
    async fn orders_in(&self, window: &MonthWindow) -> Result<Vec<Order>, Error>;
    async fn recent_entries(&self, limit: u32) -> Result<Vec<LedgerEntry>, Error>;
    async fn recent_orders(&self, limit: u32) -> Result<Vec<Order>, Error>;
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, Error>;
    async fn get_account(&self, id: Uuid) -> Result<Option<CashAccount>, Error>;
    async fn list_accounts(&self) -> Result<Vec<CashAccount>, Error>;
    async fn get_strain(&self, id: Uuid) -> Result<Option<Strain>, Error>;

    // WRITE OPERATIONS
    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), Error>;
    async fn insert_order(&self, order: Order) -> Result<(), Error>;
    async fn create_client(&self, client: Client) -> Result<(), Error>;
    async fn create_account(&self, account: CashAccount) -> Result<(), Error>;
    async fn create_strain(&self, strain: Strain) -> Result<(), Error>;

    /// Insert `entry` and move its account's balance by `delta`.
    /// Returns the account as it stands afterwards.
    async fn record_movement(
        &self,
        entry: LedgerEntry,
        delta: Decimal,
    ) -> Result<CashAccount, Error>;

    /// Apply every write of `plan`, or none of them.
    async fn record_order(&self, plan: OrderPlan) -> Result<(), Error>;

    /// Insert `movement` and apply it to the strain's stock.
    /// Returns the strain as it stands afterwards.
    async fn record_stock_movement(&self, movement: StockMovement) -> Result<Strain, Error>;
}

/// Shared handle over one store and its configuration.
pub struct Cultivo {
    adapter: Arc<dyn StoreAdapter>,
    config: Arc<Config>,
}

impl Cultivo {
    pub fn new(adapter: Box<dyn StoreAdapter>, config: Config) -> Self {
        Self {
            adapter: adapter.into(),
            config: Arc::new(config),
        }
    }

    /// Get adapter reference
    pub fn adapter(&self) -> &dyn StoreAdapter {
        self.adapter.as_ref()
    }

    pub fn adapter_arc(&self) -> Arc<dyn StoreAdapter> {
        Arc::clone(&self.adapter)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn finance(&self) -> Finance {
        Finance::new(self.adapter_arc(), Arc::clone(&self.config))
    }

    pub fn cashbox(&self) -> Cashbox {
        Cashbox::new(self.adapter_arc())
    }

    pub fn sales(&self) -> Sales {
        Sales::new(self.adapter_arc(), Arc::clone(&self.config))
    }

    /// Dashboard opened on the current month.
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(
            self.finance(),
            MonthWindow::resolve(None, None, self.config.utc_offset),
        )
    }
}
