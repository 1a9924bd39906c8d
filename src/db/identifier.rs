//! PostgreSQL identifier validation and quoting.
//!
//! DDL cannot take bind parameters, so every schema, table and column name
//! that reaches generated SQL passes through [`quote_ident`], and tenant
//! supplied schema names must satisfy [`is_valid_identifier`] first.

/// Lowercase ASCII, digits and underscore, not starting with a digit, at most 63 bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let Some(first_char) = name.chars().next() else {
        return false;
    };
    if !first_char.is_ascii_lowercase() && first_char != '_' {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}
