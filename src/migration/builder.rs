//! Schema operations recorded by a migration body and rendered to DDL.
//!
//! Every name is quoted on render. The schema an operation targets is part of
//! the operation itself, so a schema-parametric migration produces different
//! SQL for every tenant it is instantiated for.

use crate::db::identifier::{qualified_name, quote_ident};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    sql_type: String,
    nullable: bool,
    default_sql: Option<String>,
}

impl ColumnDef {
    /// A `NOT NULL` column without a default.
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: false,
            default_sql: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Default expression, emitted verbatim.
    pub fn default_sql(mut self, expression: &str) -> Self {
        self.default_sql = Some(expression.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_sql {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    EnsureSchema {
        name: String,
    },
    CreateTable {
        schema: String,
        name: String,
        columns: Vec<ColumnDef>,
        primary_key: String,
    },
    DropTable {
        schema: String,
        name: String,
    },
    AddColumn {
        schema: String,
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        schema: String,
        table: String,
        name: String,
    },
    CreateIndex {
        schema: String,
        table: String,
        name: String,
        columns: Vec<String>,
        unique: bool,
    },
}

impl Operation {
    /// The `(schema, table)` this operation changes, if it changes a table.
    pub fn target_table(&self) -> Option<(&str, &str)> {
        match self {
            Operation::EnsureSchema { .. } => None,
            Operation::CreateTable { schema, name, .. } | Operation::DropTable { schema, name } => {
                Some((schema.as_str(), name.as_str()))
            }
            Operation::AddColumn { schema, table, .. }
            | Operation::DropColumn { schema, table, .. }
            | Operation::CreateIndex { schema, table, .. } => Some((schema.as_str(), table.as_str())),
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            Operation::EnsureSchema { name } => {
                format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(name))
            }
            Operation::CreateTable {
                schema,
                name,
                columns,
                primary_key,
            } => {
                let mut parts: Vec<String> = columns.iter().map(ColumnDef::to_sql).collect();
                parts.push(format!(
                    "CONSTRAINT {} PRIMARY KEY ({})",
                    quote_ident(&format!("PK_{}", name)),
                    quote_ident(primary_key)
                ));
                format!(
                    "CREATE TABLE {} ({})",
                    qualified_name(schema, name),
                    parts.join(", ")
                )
            }
            Operation::DropTable { schema, name } => {
                format!("DROP TABLE {}", qualified_name(schema, name))
            }
            Operation::AddColumn {
                schema,
                table,
                column,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                qualified_name(schema, table),
                column.to_sql()
            ),
            Operation::DropColumn {
                schema,
                table,
                name,
            } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                qualified_name(schema, table),
                quote_ident(name)
            ),
            Operation::CreateIndex {
                schema,
                table,
                name,
                columns,
                unique,
            } => {
                let columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if *unique { "UNIQUE " } else { "" },
                    quote_ident(name),
                    qualified_name(schema, table),
                    columns.join(", ")
                )
            }
        }
    }
}

/// Collects the operations of one migration direction.
#[derive(Debug, Default)]
pub struct MigrationBuilder {
    operations: Vec<Operation>,
}

impl MigrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_schema(&mut self, name: &str) -> &mut Self {
        self.operations.push(Operation::EnsureSchema {
            name: name.to_string(),
        });
        self
    }

    pub fn create_table(
        &mut self,
        schema: &str,
        name: &str,
        columns: Vec<ColumnDef>,
        primary_key: &str,
    ) -> &mut Self {
        self.operations.push(Operation::CreateTable {
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            primary_key: primary_key.to_string(),
        });
        self
    }

    pub fn drop_table(&mut self, schema: &str, name: &str) -> &mut Self {
        self.operations.push(Operation::DropTable {
            schema: schema.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn add_column(&mut self, schema: &str, table: &str, column: ColumnDef) -> &mut Self {
        self.operations.push(Operation::AddColumn {
            schema: schema.to_string(),
            table: table.to_string(),
            column,
        });
        self
    }

    pub fn drop_column(&mut self, schema: &str, table: &str, name: &str) -> &mut Self {
        self.operations.push(Operation::DropColumn {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn create_index(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
        columns: &[&str],
        unique: bool,
    ) -> &mut Self {
        self.operations.push(Operation::CreateIndex {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        });
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}
