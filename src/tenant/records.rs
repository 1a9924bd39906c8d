use crate::error::{Result, StoreError};
use crate::registry::CatalogItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of a tenant's `inventory` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub code: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub last_ordered_at: DateTime<Utc>,
}

/// Inbound stock write. `last_ordered_at` defaults to the time of the write.
#[derive(Debug, Clone, Deserialize)]
pub struct StockWrite {
    pub code: String,
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub last_ordered_at: Option<DateTime<Utc>>,
}

impl StockWrite {
    /// Trim the product code and check the write before any catalog lookup.
    pub(crate) fn validated(mut self) -> Result<Self> {
        self.code = self.code.trim().to_string();
        if self.code.is_empty() {
            return Err(StoreError::invalid_request("Product code must not be empty"));
        }
        if self.quantity < 0 {
            return Err(StoreError::invalid_request(format!(
                "Stock quantity for {} must not be negative",
                self.code
            )));
        }
        Ok(self)
    }

    /// Record to store once the catalog reference has been checked.
    pub(crate) fn into_record(self, canonical_code: &str, now: DateTime<Utc>) -> StockRecord {
        StockRecord {
            code: canonical_code.to_string(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            last_ordered_at: self.last_ordered_at.unwrap_or(now),
        }
    }
}

/// Check a stock write against the catalog row it references.
///
/// Shared by every store backend so the rule lives in one place; backends
/// call it inside the same transaction that performs the write.
pub(crate) fn check_catalog_reference<'a>(
    code: &str,
    item: Option<&'a CatalogItem>,
) -> Result<&'a CatalogItem> {
    let item = item.ok_or_else(|| StoreError::ProductNotFound {
        code: code.to_string(),
    })?;

    if item.discontinued {
        return Err(StoreError::ProductDiscontinued {
            code: item.code.clone(),
        });
    }

    Ok(item)
}

/// Stock joined with the shared catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueEntry {
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub reference_price: Decimal,
    pub quantity: i32,
    /// Percentage of the store price over the reference price. `None` when
    /// the ratio is outside the range a `Decimal` can hold.
    pub difference: Option<Decimal>,
}

impl CatalogueEntry {
    pub fn new(stock: &StockRecord, item: &CatalogItem) -> Self {
        Self {
            code: stock.code.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            unit_price: stock.unit_price,
            reference_price: item.reference_price,
            quantity: stock.quantity,
            difference: price_difference(stock.unit_price, item.reference_price),
        }
    }
}

/// Zero prices count as 1 so the ratio stays defined.
pub fn price_difference(price: Decimal, reference: Decimal) -> Option<Decimal> {
    let price = if price.is_zero() { Decimal::ONE } else { price };
    let reference = if reference.is_zero() {
        Decimal::ONE
    } else {
        reference
    };

    Decimal::ONE_HUNDRED
        .checked_mul(price)?
        .checked_div(reference)?
        .checked_sub(Decimal::ONE_HUNDRED)
        .map(|d| d.round_dp(2))
}
