use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{CashAccount, EntryKind, Error, LedgerEntry, StoreAdapter};

/// A cash movement as entered on the cash page. `amount` is a positive
/// magnitude; the kind decides which way the balance moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub account_id: Uuid,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub note: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct Cashbox {
    adapter: Arc<dyn StoreAdapter>,
}

impl Cashbox {
    pub fn new(adapter: Arc<dyn StoreAdapter>) -> Self {
        Self { adapter }
    }

    /// Record the movement and move the account balance by it, as one
    /// store write. Returns the account as it stands afterwards.
    pub async fn register_movement(&self, movement: NewMovement) -> Result<CashAccount, Error> {
        if movement.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }
        let delta = movement
            .kind
            .balance_sign()
            .checked_mul(movement.amount)
            .ok_or(Error::InvalidAmount)?;

        let entry = LedgerEntry::new(
            movement.account_id,
            movement.kind,
            movement.amount,
            movement.at.unwrap_or_else(Utc::now),
            movement.note.filter(|n| !n.trim().is_empty()),
        );
        let account = self.adapter.record_movement(entry, delta).await?;

        counter!("cultivo.movements.total", "kind" => movement.kind.as_str()).increment(1);
        tracing::info!(
            account = %account.name,
            kind = %movement.kind,
            amount = %movement.amount,
            balance = %account.balance,
            "movement registered"
        );

        Ok(account)
    }

    /// Latest movements, newest first.
    pub async fn recent_movements(&self, limit: u32) -> Result<Vec<LedgerEntry>, Error> {
        self.adapter.recent_entries(limit).await
    }

    pub async fn accounts(&self) -> Result<Vec<CashAccount>, Error> {
        self.adapter.list_accounts().await
    }

    pub async fn open_account(&self, name: &str, balance: Decimal) -> Result<CashAccount, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("account name is empty".to_string()));
        }

        let account = CashAccount::new(name, balance);
        self.adapter.create_account(account.clone()).await?;
        Ok(account)
    }
}
