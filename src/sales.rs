use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    Client, ClientUpdate, Config, EntryKind, Error, LedgerEntry, Order, OrderPlan, OrderRequest,
    StockMovement, StoreAdapter, Strain, order::TRIAL_PAYMENT_METHOD,
};

#[derive(Clone)]
pub struct Sales {
    adapter: Arc<dyn StoreAdapter>,
    config: Arc<Config>,
}

impl Sales {
    pub fn new(adapter: Arc<dyn StoreAdapter>, config: Arc<Config>) -> Self {
        Self { adapter, config }
    }

    pub async fn create_client(&self, name: &str) -> Result<Client, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("client name is empty".to_string()));
        }

        let client = Client::new(name);
        self.adapter.create_client(client.clone()).await?;
        Ok(client)
    }

    /// Latest orders, newest first, up to the configured limit.
    pub async fn recent_orders(&self) -> Result<Vec<Order>, Error> {
        self.adapter
            .recent_orders(self.config.recent_orders_limit)
            .await
    }

    /// Validate and record an order.
    ///
    /// The strain stock always drops by the weighed grams. A paid order also
    /// updates the client's purchase stats and, when an account is named
    /// after the payment method, credits it and records the income. A trial
    /// order only stamps the client's last trial date.
    ///
    /// All of it is one store write: on any error nothing is recorded.
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order, Error> {
        let (client_id, strain_id) = validate(&request)?;
        let total = request
            .billed_grams
            .checked_mul(request.price_per_gram)
            .ok_or(Error::InvalidAmount)?;

        let now = Utc::now();
        let date = request.date.unwrap_or(now);
        let (number, payment_method) = if request.trial {
            (
                format!("ORD-TRIAL-{}", now.timestamp_millis()),
                TRIAL_PAYMENT_METHOD.to_string(),
            )
        } else {
            (
                request
                    .number
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("ORD-{}", now.timestamp_millis())),
                request.payment_method.trim().to_string(),
            )
        };

        let account = if request.trial {
            None
        } else {
            self.adapter
                .list_accounts()
                .await?
                .into_iter()
                .find(|a| a.name == payment_method)
        };

        let order = Order {
            id: Uuid::now_v7(),
            number: number.clone(),
            timestamp: date,
            client_id: Some(client_id),
            strain_id: Some(strain_id),
            total_amount: total,
            billed_grams: Some(request.billed_grams),
            actual_grams: Some(request.actual_grams),
            price_per_gram: Some(request.price_per_gram),
            payment_method,
            account_id: account.as_ref().map(|a| a.id),
        };

        let (client_update, note) = if request.trial {
            (ClientUpdate::Trial { at: date }, format!("Trial {}", number))
        } else {
            (
                ClientUpdate::Purchase {
                    grams: request.billed_grams,
                    spent: total,
                    at: date,
                },
                format!("Outflow for order {}", number),
            )
        };
        let income = account.map(|a| {
            LedgerEntry::new(
                a.id,
                EntryKind::Income,
                total,
                date,
                Some(format!("Order {}", number)),
            )
        });

        self.adapter
            .record_order(OrderPlan {
                order: order.clone(),
                movement: StockMovement::outflow(strain_id, request.actual_grams, date, note),
                client_id,
                client_update,
                income,
            })
            .await?;

        let kind = if order.is_trial() { "trial" } else { "paid" };
        counter!("cultivo.orders.total", "kind" => kind).increment(1);
        histogram!("cultivo.orders.amount").record(total.to_f64().unwrap_or(0.0));
        tracing::info!(
            order = %order.number,
            client_id = %client_id,
            strain_id = %strain_id,
            total = %total,
            "order placed"
        );

        Ok(order)
    }

    /// Add `grams` to a strain's stock and record the inflow.
    pub async fn restock(
        &self,
        strain_id: Uuid,
        grams: Decimal,
        note: Option<String>,
    ) -> Result<Strain, Error> {
        if grams <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }

        let note = note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Restock".to_string());
        let strain = self
            .adapter
            .record_stock_movement(StockMovement::inflow(strain_id, grams, Utc::now(), note))
            .await?;

        tracing::info!(
            strain = %strain.name,
            grams = %grams,
            stock = %strain.grams_in_stock,
            "strain restocked"
        );

        Ok(strain)
    }
}

fn validate(request: &OrderRequest) -> Result<(Uuid, Uuid), Error> {
    let (Some(client_id), Some(strain_id)) = (request.client_id, request.strain_id) else {
        return Err(Error::Validation(
            "client and strain are required".to_string(),
        ));
    };

    if request.actual_grams < Decimal::ZERO {
        return Err(Error::Validation("grams cannot be negative".to_string()));
    }

    if !request.trial {
        if request.payment_method.trim().is_empty() {
            return Err(Error::Validation("payment method is required".to_string()));
        }
        if request.actual_grams <= Decimal::ZERO
            || request.billed_grams <= Decimal::ZERO
            || request.price_per_gram <= Decimal::ZERO
        {
            return Err(Error::Validation(
                "grams and price must be positive".to_string(),
            ));
        }
    }

    Ok((client_id, strain_id))
}
