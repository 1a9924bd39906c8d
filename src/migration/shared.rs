//! Migrations of the shared schema. Fixed: they always target `hq`.

use crate::migration::{ColumnDef, Migration, MigrationBuilder, MigrationDefinition};
use crate::model::SHARED_SCHEMA;

struct CreateStoresAndProducts;

impl Migration for CreateStoresAndProducts {
    fn up(&self, builder: &mut MigrationBuilder) {
        builder
            .ensure_schema(SHARED_SCHEMA)
            .create_table(
                SHARED_SCHEMA,
                "products",
                vec![
                    ColumnDef::new("code", "text"),
                    ColumnDef::new("name", "text"),
                    ColumnDef::new("category", "text"),
                    ColumnDef::new("discontinued", "boolean").default_sql("false"),
                ],
                "code",
            )
            .create_table(
                SHARED_SCHEMA,
                "stores",
                vec![
                    ColumnDef::new("code", "text"),
                    ColumnDef::new("name", "text"),
                    ColumnDef::new("city", "text"),
                    ColumnDef::new("schema_name", "text"),
                ],
                "code",
            )
            .create_index(
                SHARED_SCHEMA,
                "stores",
                "IX_stores_schema_name",
                &["schema_name"],
                true,
            );
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        builder
            .drop_table(SHARED_SCHEMA, "stores")
            .drop_table(SHARED_SCHEMA, "products");
    }
}

struct AddProductReferencePrice;

impl Migration for AddProductReferencePrice {
    fn up(&self, builder: &mut MigrationBuilder) {
        builder.add_column(
            SHARED_SCHEMA,
            "products",
            ColumnDef::new("reference_price", "numeric").default_sql("0"),
        );
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        builder.drop_column(SHARED_SCHEMA, "products", "reference_price");
    }
}

fn create_stores_and_products() -> Box<dyn Migration> {
    Box::new(CreateStoresAndProducts)
}

fn add_product_reference_price() -> Box<dyn Migration> {
    Box::new(AddProductReferencePrice)
}

pub fn migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::fixed(
            "20231001190547_create_stores_and_products",
            create_stores_and_products,
        ),
        MigrationDefinition::fixed(
            "20231008163826_add_product_reference_price",
            add_product_reference_price,
        ),
    ]
}
