//! Migrations run in every tenant schema.
//!
//! Schema-parametric: each instance targets the schema of the tenant context
//! it was built for.

use crate::migration::{ColumnDef, Migration, MigrationBuilder, MigrationDefinition, TenantContext};

struct CreateInventory {
    schema: String,
}

impl Migration for CreateInventory {
    fn up(&self, builder: &mut MigrationBuilder) {
        builder.ensure_schema(&self.schema).create_table(
            &self.schema,
            "inventory",
            vec![
                ColumnDef::new("code", "text"),
                ColumnDef::new("quantity", "integer").default_sql("0"),
                ColumnDef::new("last_ordered_at", "timestamp with time zone").default_sql("now()"),
            ],
            "code",
        );
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        builder.drop_table(&self.schema, "inventory");
    }
}

struct AddInventoryUnitPrice {
    schema: String,
}

impl Migration for AddInventoryUnitPrice {
    fn up(&self, builder: &mut MigrationBuilder) {
        builder.add_column(
            &self.schema,
            "inventory",
            ColumnDef::new("unit_price", "numeric").default_sql("0"),
        );
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        builder.drop_column(&self.schema, "inventory", "unit_price");
    }
}

fn create_inventory(context: &dyn TenantContext) -> Box<dyn Migration> {
    Box::new(CreateInventory {
        schema: context.schema().to_string(),
    })
}

fn add_inventory_unit_price(context: &dyn TenantContext) -> Box<dyn Migration> {
    Box::new(AddInventoryUnitPrice {
        schema: context.schema().to_string(),
    })
}

pub fn migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::schema_parametric("20231002163234_create_inventory", create_inventory),
        MigrationDefinition::schema_parametric(
            "20231008163755_add_inventory_unit_price",
            add_inventory_unit_price,
        ),
    ]
}
