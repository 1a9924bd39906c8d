use crate::migration::MigrationBuilder;
use crate::model::CompiledModel;
use std::fmt;

/// The bound tenant a schema-parametric migration is instantiated for.
pub trait TenantContext: Send + Sync {
    fn schema(&self) -> &str;
    fn model(&self) -> &CompiledModel;
}

/// A migration body. `up` applies the change and `down` reverses it.
pub trait Migration: Send + Sync {
    fn up(&self, builder: &mut MigrationBuilder);
    fn down(&self, builder: &mut MigrationBuilder);
}

pub type FixedConstructor = fn() -> Box<dyn Migration>;
pub type SchemaParametricConstructor = fn(&dyn TenantContext) -> Box<dyn Migration>;

/// How a migration is instantiated.
#[derive(Clone, Copy)]
pub enum MigrationVariant {
    /// Targets the same schema wherever it runs.
    Fixed(FixedConstructor),
    /// Built per tenant from the bound tenant context.
    SchemaParametric(SchemaParametricConstructor),
}

#[derive(Clone, Copy)]
pub struct MigrationDefinition {
    /// Sortable id; applied in ascending order.
    pub id: &'static str,
    pub variant: MigrationVariant,
}

impl MigrationDefinition {
    pub const fn fixed(id: &'static str, constructor: FixedConstructor) -> Self {
        Self {
            id,
            variant: MigrationVariant::Fixed(constructor),
        }
    }

    pub const fn schema_parametric(
        id: &'static str,
        constructor: SchemaParametricConstructor,
    ) -> Self {
        Self {
            id,
            variant: MigrationVariant::SchemaParametric(constructor),
        }
    }

    pub fn is_schema_parametric(&self) -> bool {
        matches!(self.variant, MigrationVariant::SchemaParametric(_))
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = if self.is_schema_parametric() {
            "schema_parametric"
        } else {
            "fixed"
        };
        f.debug_struct("MigrationDefinition")
            .field("id", &self.id)
            .field("variant", &variant)
            .finish()
    }
}
