use crate::api::AppState;
use crate::error::{Result, StoreError};
use crate::migration::OrchestrationReport;
use crate::model::CompiledModel;
use crate::tenant::{ensure_tenant_schema, TenantHandle};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Run a full migration sweep now.
pub async fn run_migrations(State(state): State<Arc<AppState>>) -> Result<Json<OrchestrationReport>> {
    info!("Migration sweep requested through admin endpoint");
    Ok(Json(state.orchestrator.run().await?))
}

#[derive(Deserialize)]
pub struct ModelQuery {
    pub schema: Option<String>,
}

#[derive(Serialize)]
pub struct ModelResponse {
    schema: String,
    design_time: bool,
    model: CompiledModel,
}

/// Design-time compiled tenant model, for tooling.
///
/// Only registered schemas are compiled, so the model cache holds at most one
/// design-time entry per store.
pub async fn tenant_model(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelQuery>,
) -> Result<Json<ModelResponse>> {
    let handle = match query.schema.as_deref() {
        Some(schema) => {
            ensure_tenant_schema(schema)?;
            let registered = state
                .registry
                .list_tenants()
                .await?
                .iter()
                .any(|tenant| tenant.schema_name == schema);
            if !registered {
                return Err(StoreError::UnknownSchema {
                    schema: schema.to_string(),
                });
            }
            TenantHandle::for_design_time(&state.context, schema)?
        }
        None => TenantHandle::with_default_schema(&state.context, true),
    };

    Ok(Json(ModelResponse {
        schema: handle.schema().to_string(),
        design_time: handle.is_design_time(),
        model: handle.model().clone(),
    }))
}
