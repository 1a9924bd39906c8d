use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Schema '{schema}' is reserved and cannot be bound to a tenant")]
    ReservedSchema { schema: String },

    #[error("Invalid schema name: {schema}")]
    InvalidSchemaName { schema: String },

    #[error("Operation requires a resolved tenant, but the handle is bound to '{schema}'")]
    ForbiddenTenantContext { schema: String },

    #[error("No store is registered for schema '{schema}'")]
    UnknownSchema { schema: String },

    #[error("Product code does not exist: {code}")]
    ProductNotFound { code: String },

    #[error("Product {code} is discontinued, cannot order any more")]
    ProductDiscontinued { code: String },

    #[error("Schema '{schema}' is already assigned to store {owner}")]
    DuplicateSchema { schema: String, owner: String },

    #[error("Cannot instantiate migration {migration}: {cause}")]
    MigrationInstantiation { migration: String, cause: String },

    #[error("Migration failed in {schema}: {migration} - {cause}")]
    MigrationFailed {
        schema: String,
        migration: String,
        cause: String,
    },

    #[error("Connection failed to {schema}: {cause}")]
    ConnectionFailed { schema: String, cause: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        StoreError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        StoreError::InvalidRequest {
            message: message.into(),
        }
    }

    /// Schema the error is attributed to, if any.
    pub fn schema(&self) -> Option<&str> {
        match self {
            StoreError::ReservedSchema { schema }
            | StoreError::InvalidSchemaName { schema }
            | StoreError::ForbiddenTenantContext { schema }
            | StoreError::UnknownSchema { schema }
            | StoreError::DuplicateSchema { schema, .. }
            | StoreError::MigrationFailed { schema, .. }
            | StoreError::ConnectionFailed { schema, .. } => Some(schema),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, error, cause) = match &self {
            StoreError::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", None)
            }
            StoreError::ReservedSchema { .. } => (StatusCode::BAD_REQUEST, "reserved_schema", None),
            StoreError::InvalidSchemaName { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_schema_name", None)
            }
            StoreError::ForbiddenTenantContext { .. } => {
                (StatusCode::FORBIDDEN, "forbidden_tenant_context", None)
            }
            StoreError::UnknownSchema { .. } => (StatusCode::NOT_FOUND, "unknown_schema", None),
            StoreError::ProductNotFound { .. } => (StatusCode::NOT_FOUND, "product_not_found", None),
            StoreError::ProductDiscontinued { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "product_discontinued", None)
            }
            StoreError::DuplicateSchema { .. } => (StatusCode::CONFLICT, "duplicate_schema", None),
            StoreError::MigrationInstantiation { cause, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "migration_instantiation_failed",
                Some(cause.clone()),
            ),
            StoreError::MigrationFailed { cause, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "migration_failed",
                Some(cause.clone()),
            ),
            StoreError::ConnectionFailed { cause, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "connection_failed",
                Some(cause.clone()),
            ),
            StoreError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request", None),
            StoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
            schema: self.schema().map(str::to_string),
            cause,
        };

        (status, Json(body)).into_response()
    }
}

/// True when a postgres error is a unique-constraint violation.
pub fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Internal(format!("Pool error: {}", err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
