use crate::error::{Result, StoreError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A store registered in the shared `stores` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub code: String,
    pub name: String,
    pub city: String,
    pub schema_name: String,
}

impl TenantRecord {
    pub fn new(code: &str, name: &str, city: &str, schema_name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            city: city.to_string(),
            schema_name: schema_name.to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(StoreError::invalid_request("Store code must not be empty"));
        }
        Ok(())
    }
}

/// A product in the shared catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub code: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub reference_price: Decimal,
    #[serde(default)]
    pub discontinued: bool,
}

impl CatalogItem {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(StoreError::invalid_request("Product code must not be empty"));
        }
        Ok(())
    }
}
