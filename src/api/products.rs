use crate::api::AppState;
use crate::error::Result;
use crate::registry::CatalogItem;
use axum::{extract::State, Json};
use std::sync::Arc;

pub async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<CatalogItem>>> {
    Ok(Json(state.registry.list_products().await?))
}

pub async fn upsert_product(
    State(state): State<Arc<AppState>>,
    Json(item): Json<CatalogItem>,
) -> Result<Json<CatalogItem>> {
    Ok(Json(state.registry.upsert_product(item).await?))
}
