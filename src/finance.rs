use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{
    AccountOverview, Config, EntryKind, Error, LedgerEntry, MonthWindow, MostActiveClient, Order,
    StoreAdapter,
};

/// Sum of income entries, signed as stored.
pub fn sum_income(entries: &[LedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Income)
        .map(|e| e.amount)
        .sum()
}

/// Sum of reinvestment entries as a positive magnitude, whatever sign they
/// were stored with.
pub fn sum_reinvestment(entries: &[LedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Reinvestment)
        .map(|e| e.amount.abs())
        .sum()
}

/// Sum of salary entries, signed as stored.
pub fn sum_salary(entries: &[LedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Salary)
        .map(|e| e.amount)
        .sum()
}

/// Income minus reinvestment. Salary is not deducted.
pub fn net_profit(entries: &[LedgerEntry]) -> Decimal {
    sum_income(entries) - sum_reinvestment(entries)
}

/// Income minus reinvestment minus salary.
pub fn net_profit_after_salary(entries: &[LedgerEntry]) -> Decimal {
    net_profit(entries) - sum_salary(entries).abs()
}

pub fn grams_sold(orders: &[Order]) -> Decimal {
    orders.iter().map(Order::grams_sold).sum()
}

/// Per-client order count and billed total for one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTally {
    pub client_id: Uuid,
    pub order_count: u32,
    pub total_billed: Decimal,
}

/// Client with the most orders. Orders without a client are skipped. On equal
/// counts the client seen first in `orders` wins.
pub fn top_client(orders: &[Order]) -> Option<ClientTally> {
    let mut tallies: Vec<ClientTally> = Vec::new();
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for order in orders {
        let Some(client_id) = order.client_id else {
            continue;
        };

        let pos = *positions.entry(client_id).or_insert_with(|| {
            tallies.push(ClientTally {
                client_id,
                order_count: 0,
                total_billed: Decimal::ZERO,
            });
            tallies.len() - 1
        });

        let tally = &mut tallies[pos];
        tally.order_count += 1;
        tally.total_billed += order.total_amount;
    }

    let mut best: Option<ClientTally> = None;
    for tally in tallies {
        match &best {
            Some(current) if current.order_count >= tally.order_count => {}
            _ => best = Some(tally),
        }
    }

    best
}

/// Every monthly figure, derived from one read of the month's entries and
/// one read of its orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: u32,
    pub year: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub income: Decimal,
    pub reinvestment: Decimal,
    pub salary: Decimal,
    pub net_profit: Decimal,
    pub net_profit_after_salary: Decimal,
    pub grams_sold: Decimal,
    pub most_active_client: Option<MostActiveClient>,
    pub entry_count: usize,
    pub order_count: usize,
}

/// Monthly finance rollups over a store.
///
/// Month arguments are zero-based; omitting either the month or the year
/// selects the current month in the configured offset. Reads are best effort:
/// a failed query is logged and treated as an empty result.
#[derive(Clone)]
pub struct Finance {
    adapter: Arc<dyn StoreAdapter>,
    config: Arc<Config>,
}

impl Finance {
    pub fn new(adapter: Arc<dyn StoreAdapter>, config: Arc<Config>) -> Self {
        Self { adapter, config }
    }

    pub fn window(&self, month: Option<i32>, year: Option<i32>) -> MonthWindow {
        MonthWindow::resolve(month, year, self.config.utc_offset)
    }

    pub async fn fetch_ledger_entries(&self, window: &MonthWindow) -> Vec<LedgerEntry> {
        let result = self.adapter.entries_in(window).await;
        degrade(result, "entries", window)
    }

    pub async fn fetch_orders(&self, window: &MonthWindow) -> Vec<Order> {
        let result = self.adapter.orders_in(window).await;
        degrade(result, "orders", window)
    }

    pub async fn income(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        sum_income(&self.fetch_ledger_entries(&window).await)
    }

    pub async fn reinvestment(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        sum_reinvestment(&self.fetch_ledger_entries(&window).await)
    }

    pub async fn salary(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        sum_salary(&self.fetch_ledger_entries(&window).await)
    }

    /// Income minus reinvestment for the month.
    pub async fn net_profit(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        net_profit(&self.fetch_ledger_entries(&window).await)
    }

    pub async fn net_profit_after_salary(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        net_profit_after_salary(&self.fetch_ledger_entries(&window).await)
    }

    pub async fn grams_sold(&self, month: Option<i32>, year: Option<i32>) -> Decimal {
        let window = self.window(month, year);
        grams_sold(&self.fetch_orders(&window).await)
    }

    pub async fn most_active_client(
        &self,
        month: Option<i32>,
        year: Option<i32>,
    ) -> Option<MostActiveClient> {
        let window = self.window(month, year);
        let orders = self.fetch_orders(&window).await;
        self.resolve_top_client(&orders).await
    }

    /// Every figure for one month, read once.
    pub async fn monthly_summary(&self, month: Option<i32>, year: Option<i32>) -> MonthlySummary {
        self.summary_for(&self.window(month, year)).await
    }

    pub async fn summary_for(&self, window: &MonthWindow) -> MonthlySummary {
        let start = Instant::now();

        let (entries, orders) =
            tokio::join!(self.fetch_ledger_entries(window), self.fetch_orders(window));
        let most_active_client = self.resolve_top_client(&orders).await;

        let summary = MonthlySummary {
            month: window.month(),
            year: window.year(),
            start: window.start,
            end: window.end,
            income: sum_income(&entries),
            reinvestment: sum_reinvestment(&entries),
            salary: sum_salary(&entries),
            net_profit: net_profit(&entries),
            net_profit_after_salary: net_profit_after_salary(&entries),
            grams_sold: grams_sold(&orders),
            most_active_client,
            entry_count: entries.len(),
            order_count: orders.len(),
        };

        histogram!("cultivo.summary.duration_ms").record(start.elapsed().as_millis() as f64);
        tracing::debug!(
            month = summary.month,
            year = summary.year,
            income = %summary.income,
            reinvestment = %summary.reinvestment,
            net_profit = %summary.net_profit,
            "monthly summary computed"
        );

        summary
    }

    /// Balances across all accounts. A failed read yields zeros.
    pub async fn account_overview(&self) -> AccountOverview {
        match self.adapter.list_accounts().await {
            Ok(accounts) => AccountOverview::from_accounts(
                &accounts,
                &self.config.cash_account_keyword,
                &self.config.wallet_account_keyword,
            ),
            Err(err) => {
                counter!("cultivo.store.failures", "query" => "accounts").increment(1);
                tracing::warn!(error = %err, "account read failed, reporting zero balances");
                AccountOverview::default()
            }
        }
    }

    async fn resolve_top_client(&self, orders: &[Order]) -> Option<MostActiveClient> {
        let tally = top_client(orders)?;

        match self.adapter.get_client(tally.client_id).await {
            Ok(Some(client)) => Some(MostActiveClient {
                name: client.full_name,
                order_count: tally.order_count,
                total_billed: tally.total_billed,
            }),
            Ok(None) => {
                tracing::warn!(client_id = %tally.client_id, "most active client not found");
                None
            }
            Err(err) => {
                counter!("cultivo.store.failures", "query" => "client").increment(1);
                tracing::warn!(
                    client_id = %tally.client_id,
                    error = %err,
                    "client lookup failed"
                );
                None
            }
        }
    }
}

fn degrade<T>(result: Result<Vec<T>, Error>, query: &'static str, window: &MonthWindow) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            counter!("cultivo.store.failures", "query" => query).increment(1);
            tracing::warn!(
                query,
                start = %window.start,
                end = %window.end,
                error = %err,
                "store read failed, treating month as empty"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(kind: EntryKind, amount: Decimal) -> LedgerEntry {
        LedgerEntry::new(Uuid::now_v7(), kind, amount, Utc::now(), None)
    }

    fn order(client: Option<Uuid>, total: Decimal) -> Order {
        Order::new(Utc::now(), client, total)
    }

    #[test]
    fn test_sums_by_kind() {
        let entries = vec![
            entry(EntryKind::Income, dec!(1000)),
            entry(EntryKind::Reinvestment, dec!(-200)),
            entry(EntryKind::Salary, dec!(300)),
        ];

        assert_eq!(sum_income(&entries), dec!(1000));
        assert_eq!(sum_reinvestment(&entries), dec!(200));
        assert_eq!(sum_salary(&entries), dec!(300));
        assert_eq!(net_profit(&entries), dec!(800));
        assert_eq!(net_profit_after_salary(&entries), dec!(500));
    }

    #[test]
    fn test_reinvestment_is_never_negative() {
        let entries = vec![
            entry(EntryKind::Reinvestment, dec!(-50.25)),
            entry(EntryKind::Reinvestment, dec!(49.75)),
        ];
        assert_eq!(sum_reinvestment(&entries), dec!(100));
    }

    #[test]
    fn test_empty_month_is_zero() {
        assert_eq!(sum_income(&[]), Decimal::ZERO);
        assert_eq!(net_profit(&[]), Decimal::ZERO);
        assert_eq!(grams_sold(&[]), Decimal::ZERO);
        assert!(top_client(&[]).is_none());
    }

    #[test]
    fn test_grams_sold_uses_billed_then_actual() {
        let orders = vec![
            order(None, dec!(0)).with_grams(Some(dec!(5)), None),
            order(None, dec!(0)).with_grams(None, Some(dec!(3))),
            order(None, dec!(0)).with_grams(None, None),
        ];
        assert_eq!(grams_sold(&orders), dec!(8));
    }

    #[test]
    fn test_count_beats_total_spend() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let orders = vec![
            order(Some(a), dec!(100)),
            order(Some(a), dec!(50)),
            order(Some(b), dec!(900)),
        ];

        let tally = top_client(&orders).unwrap();
        assert_eq!(tally.client_id, a);
        assert_eq!(tally.order_count, 2);
        assert_eq!(tally.total_billed, dec!(150));
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let orders = vec![
            order(Some(b), dec!(10)),
            order(Some(a), dec!(999)),
            order(Some(a), dec!(1)),
            order(Some(b), dec!(10)),
        ];

        assert_eq!(top_client(&orders).unwrap().client_id, b);
    }

    #[test]
    fn test_orders_without_client_are_skipped() {
        let orders = vec![order(None, dec!(10)), order(None, dec!(20))];
        assert!(top_client(&orders).is_none());
    }
}
