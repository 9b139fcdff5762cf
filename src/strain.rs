use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// A genetic strain and the grams of it currently in stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strain {
    pub id: Uuid,
    pub name: String,
    pub grams_in_stock: Decimal,
}

impl Strain {
    pub fn new(name: &str, grams_in_stock: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.to_string(),
            grams_in_stock,
        }
    }

    /// Stock left once `movement` is applied. An outflow may not take more
    /// than the strain holds.
    pub fn stock_after(&self, movement: &StockMovement) -> Result<Decimal, Error> {
        if movement.kind == StockMovementKind::Outflow && self.grams_in_stock < movement.grams {
            return Err(Error::InsufficientStock {
                available: self.grams_in_stock,
                requested: movement.grams,
            });
        }

        self.grams_in_stock
            .checked_add(movement.stock_delta())
            .ok_or(Error::InvalidAmount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockMovementKind {
    Inflow,
    Outflow,
}

impl StockMovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovementKind::Inflow => "inflow",
            StockMovementKind::Outflow => "outflow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub strain_id: Uuid,
    pub kind: StockMovementKind,
    pub grams: Decimal,
    pub at: DateTime<Utc>,
    pub note: String,
}

impl StockMovement {
    pub fn inflow(strain_id: Uuid, grams: Decimal, at: DateTime<Utc>, note: String) -> Self {
        Self::new(strain_id, StockMovementKind::Inflow, grams, at, note)
    }

    pub fn outflow(strain_id: Uuid, grams: Decimal, at: DateTime<Utc>, note: String) -> Self {
        Self::new(strain_id, StockMovementKind::Outflow, grams, at, note)
    }

    fn new(
        strain_id: Uuid,
        kind: StockMovementKind,
        grams: Decimal,
        at: DateTime<Utc>,
        note: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            strain_id,
            kind,
            grams,
            at,
            note,
        }
    }

    /// Change this movement makes to the strain's stock.
    pub fn stock_delta(&self) -> Decimal {
        match self.kind {
            StockMovementKind::Inflow => self.grams,
            StockMovementKind::Outflow => -self.grams,
        }
    }
}
