//! Compiled data-model metadata.
//!
//! A [`CompiledModel`] resolves every entity a handle exposes to its
//! schema-qualified table. Tenant models embed the tenant schema in each
//! owned table name, which is why they must never be shared across schemas.

use crate::db::identifier::qualified_name;
use crate::error::{Result, StoreError};
use crate::model::SHARED_SCHEMA;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Tenant,
    CatalogItem,
    Stock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub column: &'static str,
    pub sql_type: &'static str,
}

const fn column(column: &'static str, sql_type: &'static str) -> ColumnMapping {
    ColumnMapping { column, sql_type }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMapping {
    pub entity: Entity,
    pub schema: String,
    pub table: &'static str,
    pub qualified_name: String,
    pub primary_key: &'static str,
    pub columns: Vec<ColumnMapping>,
    /// Mapped for queries but owned by another schema's migrations.
    pub excluded_from_migrations: bool,
}

impl EntityMapping {
    fn new(entity: Entity, schema: &str, excluded_from_migrations: bool) -> Self {
        let (table, columns) = match entity {
            Entity::Tenant => (
                "stores",
                vec![
                    column("code", "text"),
                    column("name", "text"),
                    column("city", "text"),
                    column("schema_name", "text"),
                ],
            ),
            Entity::CatalogItem => (
                "products",
                vec![
                    column("code", "text"),
                    column("name", "text"),
                    column("category", "text"),
                    column("reference_price", "numeric"),
                    column("discontinued", "boolean"),
                ],
            ),
            Entity::Stock => (
                "inventory",
                vec![
                    column("code", "text"),
                    column("quantity", "integer"),
                    column("unit_price", "numeric"),
                    column("last_ordered_at", "timestamp with time zone"),
                ],
            ),
        };

        Self {
            entity,
            schema: schema.to_string(),
            table,
            qualified_name: qualified_name(schema, table),
            primary_key: "code",
            columns,
            excluded_from_migrations,
        }
    }

    /// Comma-separated column list in declaration order.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.column)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledModel {
    pub default_schema: String,
    pub design_time: bool,
    pub entities: Vec<EntityMapping>,
}

impl CompiledModel {
    /// Model of the shared registry schema.
    pub fn registry(design_time: bool) -> Self {
        Self {
            default_schema: SHARED_SCHEMA.to_string(),
            design_time,
            entities: vec![
                EntityMapping::new(Entity::Tenant, SHARED_SCHEMA, false),
                EntityMapping::new(Entity::CatalogItem, SHARED_SCHEMA, false),
            ],
        }
    }

    /// Model of one tenant schema, with the shared catalog mapped read-only.
    pub fn tenant(schema: &str, design_time: bool) -> Self {
        Self {
            default_schema: schema.to_string(),
            design_time,
            entities: vec![
                EntityMapping::new(Entity::Stock, schema, false),
                EntityMapping::new(Entity::CatalogItem, SHARED_SCHEMA, true),
            ],
        }
    }

    pub fn mapping(&self, entity: Entity) -> Result<&EntityMapping> {
        self.entities
            .iter()
            .find(|m| m.entity == entity)
            .ok_or_else(|| {
                StoreError::Internal(format!(
                    "{:?} is not mapped in the model for schema {}",
                    entity, self.default_schema
                ))
            })
    }

    /// Whether migrations run under this model must leave `schema.table` alone.
    pub fn is_excluded_from_migrations(&self, schema: &str, table: &str) -> bool {
        self.entities
            .iter()
            .any(|m| m.excluded_from_migrations && m.schema == schema && m.table == table)
    }
}
