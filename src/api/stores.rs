use crate::api::AppState;
use crate::error::Result;
use crate::registry::TenantRecord;
use axum::{extract::State, Json};
use std::sync::Arc;

pub async fn list_stores(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TenantRecord>>> {
    Ok(Json(state.registry.list_tenants().await?))
}

/// Register a store or update the one with the same code.
///
/// The store's schema is created by the next migration sweep.
pub async fn upsert_store(
    State(state): State<Arc<AppState>>,
    Json(record): Json<TenantRecord>,
) -> Result<Json<TenantRecord>> {
    Ok(Json(state.registry.upsert(record).await?))
}
