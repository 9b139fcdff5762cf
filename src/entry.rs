use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Reinvestment,
    Salary,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Reinvestment => "reinvestment",
            EntryKind::Salary => "salary",
        }
    }

    /// Sign applied to an account balance when a movement of this kind is
    /// registered.
    pub fn balance_sign(&self) -> Decimal {
        match self {
            EntryKind::Income => Decimal::ONE,
            EntryKind::Reinvestment | EntryKind::Salary => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Rows written by the legacy pages carry the Spanish tags.
impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "ingreso" => Ok(EntryKind::Income),
            "reinvestment" | "reinversion" => Ok(EntryKind::Reinvestment),
            "salary" | "sueldo" => Ok(EntryKind::Salary),
            other => Err(Error::Decode(format!("unknown entry kind: {}", other))),
        }
    }
}

/// A single cash movement against an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
    pub account_id: Uuid,
}

impl LedgerEntry {
    pub fn new(
        account_id: Uuid,
        kind: EntryKind,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            amount,
            timestamp,
            note,
            account_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_both_vocabularies() {
        assert_eq!("ingreso".parse::<EntryKind>().unwrap(), EntryKind::Income);
        assert_eq!(
            "Reinversion".parse::<EntryKind>().unwrap(),
            EntryKind::Reinvestment
        );
        assert_eq!("salary".parse::<EntryKind>().unwrap(), EntryKind::Salary);
        assert!(matches!(
            "refund".parse::<EntryKind>(),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_balance_sign() {
        assert_eq!(EntryKind::Income.balance_sign(), Decimal::ONE);
        assert_eq!(EntryKind::Salary.balance_sign(), Decimal::NEGATIVE_ONE);
    }
}
