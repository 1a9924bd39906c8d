//! Migration Variant Resolver
//!
//! Picks the constructor shape of each migration definition. Fixed migrations
//! are built without arguments; schema-parametric ones receive the bound
//! tenant context. Either way the result is stamped with the active provider.

use crate::error::{Result, StoreError};
use crate::migration::{
    Migration, MigrationBuilder, MigrationDefinition, MigrationVariant, Operation, TenantContext,
};

/// A migration instance ready to render.
pub struct PreparedMigration {
    id: &'static str,
    active_provider: String,
    body: Box<dyn Migration>,
}

impl PreparedMigration {
    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn active_provider(&self) -> &str {
        &self.active_provider
    }

    pub fn up_operations(&self) -> Vec<Operation> {
        let mut builder = MigrationBuilder::new();
        self.body.up(&mut builder);
        builder.into_operations()
    }

    pub fn down_operations(&self) -> Vec<Operation> {
        let mut builder = MigrationBuilder::new();
        self.body.down(&mut builder);
        builder.into_operations()
    }
}

pub struct MigrationResolver<'a> {
    context: Option<&'a dyn TenantContext>,
}

impl<'a> MigrationResolver<'a> {
    pub fn new(context: Option<&'a dyn TenantContext>) -> Self {
        Self { context }
    }

    pub fn create_migration(
        &self,
        definition: &MigrationDefinition,
        active_provider: &str,
    ) -> Result<PreparedMigration> {
        if active_provider.trim().is_empty() {
            return Err(StoreError::MigrationInstantiation {
                migration: definition.id.to_string(),
                cause: "no active database provider is configured".to_string(),
            });
        }

        let body = match (definition.variant, self.context) {
            (MigrationVariant::SchemaParametric(construct), Some(context)) => construct(context),
            (MigrationVariant::SchemaParametric(_), None) => {
                return Err(StoreError::MigrationInstantiation {
                    migration: definition.id.to_string(),
                    cause: "migration is schema-parametric but no tenant context is bound"
                        .to_string(),
                })
            }
            (MigrationVariant::Fixed(construct), _) => construct(),
        };

        Ok(PreparedMigration {
            id: definition.id,
            active_provider: active_provider.to_string(),
            body,
        })
    }
}
