//! Endpoints scoped to the store named by the `store-code` header.

use crate::api::AppState;
use crate::error::Result;
use crate::tenant::{CatalogueEntry, StockRecord, StockWrite};
use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<StockRecord>>> {
    let handle = state.resolver.resolve_headers(&headers).await?;
    Ok(Json(handle.list_stock().await?))
}

pub async fn record_inventory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(write): Json<StockWrite>,
) -> Result<Json<StockRecord>> {
    let handle = state.resolver.resolve_headers(&headers).await?;
    Ok(Json(handle.record_stock(write).await?))
}

pub async fn catalogue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CatalogueEntry>>> {
    let handle = state.resolver.resolve_headers(&headers).await?;
    Ok(Json(handle.catalogue().await?))
}
