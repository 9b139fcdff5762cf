use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub full_name: String,
    pub purchase_count: u32,
    pub total_grams: Decimal,
    pub total_spent: Decimal,
    pub last_purchase: Option<DateTime<Utc>>,
    pub last_trial: Option<DateTime<Utc>>,
}

impl Client {
    pub fn new(full_name: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            full_name: full_name.to_string(),
            purchase_count: 0,
            total_grams: Decimal::ZERO,
            total_spent: Decimal::ZERO,
            last_purchase: None,
            last_trial: None,
        }
    }

}

/// Change an order makes to its client's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientUpdate {
    Purchase {
        grams: Decimal,
        spent: Decimal,
        at: DateTime<Utc>,
    },
    Trial {
        at: DateTime<Utc>,
    },
}

impl ClientUpdate {
    /// Apply to `client` in place. Fails with `InvalidAmount` when a running
    /// total would overflow, leaving `client` untouched.
    pub fn apply(&self, client: &mut Client) -> Result<(), Error> {
        match *self {
            ClientUpdate::Purchase { grams, spent, at } => {
                let purchase_count = client
                    .purchase_count
                    .checked_add(1)
                    .ok_or(Error::InvalidAmount)?;
                let total_grams = client
                    .total_grams
                    .checked_add(grams)
                    .ok_or(Error::InvalidAmount)?;
                let total_spent = client
                    .total_spent
                    .checked_add(spent)
                    .ok_or(Error::InvalidAmount)?;

                client.purchase_count = purchase_count;
                client.total_grams = total_grams;
                client.total_spent = total_spent;
                client.last_purchase = Some(at);
            }
            ClientUpdate::Trial { at } => client.last_trial = Some(at),
        }
        Ok(())
    }
}

/// Client with the most orders in a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostActiveClient {
    pub name: String,
    pub order_count: u32,
    pub total_billed: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_purchase_accumulates() {
        let at = Utc::now();
        let mut client = Client::new("Ana Paz");
        let update = ClientUpdate::Purchase {
            grams: dec!(5),
            spent: dec!(40),
            at,
        };

        update.apply(&mut client).unwrap();
        update.apply(&mut client).unwrap();

        assert_eq!(client.purchase_count, 2);
        assert_eq!(client.total_grams, dec!(10));
        assert_eq!(client.total_spent, dec!(80));
        assert_eq!(client.last_purchase, Some(at));
        assert!(client.last_trial.is_none());
    }

    #[test]
    fn test_overflowing_purchase_leaves_client_untouched() {
        let mut client = Client::new("Ana Paz");
        client.total_spent = Decimal::MAX;

        let result = ClientUpdate::Purchase {
            grams: dec!(1),
            spent: dec!(1),
            at: Utc::now(),
        }
        .apply(&mut client);

        assert!(matches!(result, Err(Error::InvalidAmount)));
        assert_eq!(client.purchase_count, 0);
        assert_eq!(client.total_grams, Decimal::ZERO);
    }
}
