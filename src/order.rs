use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ClientUpdate, LedgerEntry, StockMovement};

pub const TRIAL_PAYMENT_METHOD: &str = "trial";
// Trial orders written by the legacy pages.
const LEGACY_TRIAL_PAYMENT_METHOD: &str = "prueba";

/// A single sales transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub timestamp: DateTime<Utc>,
    pub client_id: Option<Uuid>,
    pub strain_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub billed_grams: Option<Decimal>,
    pub actual_grams: Option<Decimal>,
    pub price_per_gram: Option<Decimal>,
    pub payment_method: String,
    pub account_id: Option<Uuid>,
}

impl Order {
    /// Bare order as the aggregator sees it. Fields only relevant to order
    /// entry are left empty.
    pub fn new(timestamp: DateTime<Utc>, client_id: Option<Uuid>, total_amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            number: format!("ORD-{}", timestamp.timestamp_millis()),
            timestamp,
            client_id,
            strain_id: None,
            total_amount,
            billed_grams: None,
            actual_grams: None,
            price_per_gram: None,
            payment_method: String::new(),
            account_id: None,
        }
    }

    pub fn with_grams(mut self, billed: Option<Decimal>, actual: Option<Decimal>) -> Self {
        self.billed_grams = billed;
        self.actual_grams = actual;
        self
    }

    /// Grams counted as sold: billed grams, falling back to the weighed
    /// amount, else zero.
    pub fn grams_sold(&self) -> Decimal {
        self.billed_grams
            .or(self.actual_grams)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_trial(&self) -> bool {
        let method = self.payment_method.trim();
        method.eq_ignore_ascii_case(TRIAL_PAYMENT_METHOD)
            || method.eq_ignore_ascii_case(LEGACY_TRIAL_PAYMENT_METHOD)
    }
}

/// Order submitted through order entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    pub date: Option<DateTime<Utc>>,
    pub client_id: Option<Uuid>,
    pub strain_id: Option<Uuid>,
    pub actual_grams: Decimal,
    pub billed_grams: Decimal,
    pub price_per_gram: Decimal,
    pub payment_method: String,
    pub number: Option<String>,
    pub trial: bool,
}

/// Every write that placing one order makes. A store applies the plan as a
/// single unit: all of it lands or none of it does.
#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub order: Order,
    /// Outflow of the weighed grams. The strain must still hold them when the
    /// plan is applied.
    pub movement: StockMovement,
    pub client_id: Uuid,
    pub client_update: ClientUpdate,
    /// Income entry crediting the paying account by its amount.
    pub income: Option<LedgerEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grams_sold_fallbacks() {
        let now = Utc::now();
        let billed = Order::new(now, None, dec!(0)).with_grams(Some(dec!(5)), Some(dec!(6)));
        let actual = Order::new(now, None, dec!(0)).with_grams(None, Some(dec!(3)));
        let neither = Order::new(now, None, dec!(0));

        assert_eq!(billed.grams_sold(), dec!(5));
        assert_eq!(actual.grams_sold(), dec!(3));
        assert_eq!(neither.grams_sold(), Decimal::ZERO);
    }

    #[test]
    fn test_trial_tags() {
        let mut order = Order::new(Utc::now(), None, dec!(0));
        assert!(!order.is_trial());

        order.payment_method = TRIAL_PAYMENT_METHOD.to_string();
        assert!(order.is_trial());

        order.payment_method = "Prueba".to_string();
        assert!(order.is_trial());

        order.payment_method = "Efectivo".to_string();
        assert!(!order.is_trial());
    }
}
