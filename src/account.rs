use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashAccount {
    pub id: Uuid,
    pub name: String,
    pub balance: Decimal,
}

impl CashAccount {
    pub fn new(name: &str, balance: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.to_string(),
            balance,
        }
    }

    fn name_contains(&self, keyword: &str) -> bool {
        self.name
            .to_lowercase()
            .contains(&keyword.to_lowercase())
    }
}

/// Balances across every cash account, plus the two accounts the shop
/// tracks by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub total: Decimal,
    pub cash: Decimal,
    pub wallet: Decimal,
}

impl AccountOverview {
    pub fn from_accounts(accounts: &[CashAccount], cash_keyword: &str, wallet_keyword: &str) -> Self {
        let balance_of = |keyword: &str| {
            accounts
                .iter()
                .find(|a| a.name_contains(keyword))
                .map(|a| a.balance)
                .unwrap_or(Decimal::ZERO)
        };

        Self {
            total: accounts.iter().map(|a| a.balance).sum(),
            cash: balance_of(cash_keyword),
            wallet: balance_of(wallet_keyword),
        }
    }
}
