use crate::context::DataContext;
use crate::error::Result;
use crate::model::DEFAULT_SCHEMA;
use crate::registry::RegistryHandle;
use crate::tenant::TenantHandle;
use axum::http::HeaderMap;
use tracing::{debug, warn};

/// Request header carrying the caller's store code.
pub const STORE_CODE_HEADER: &str = "store-code";

/// Maps an inbound store code to a tenant-bound handle.
#[derive(Clone)]
pub struct TenantResolver {
    registry: RegistryHandle,
    context: DataContext,
}

impl TenantResolver {
    pub fn new(context: DataContext) -> Self {
        Self {
            registry: context.registry(),
            context,
        }
    }

    /// Resolve a store code. Missing or unknown codes fall back to the
    /// default schema, which refuses tenant data access.
    pub async fn resolve(&self, code: Option<&str>) -> Result<TenantHandle> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            debug!("No store code supplied, using {} schema", DEFAULT_SCHEMA);
            return Ok(TenantHandle::with_default_schema(&self.context, false));
        };

        match self.registry.find_by_schema_code(code).await? {
            Some(tenant) => {
                debug!("Store {} resolved to schema {}", tenant.code, tenant.schema_name);
                TenantHandle::for_schema(&self.context, &tenant.schema_name)
            }
            None => {
                warn!(
                    "Unknown store code '{}', falling back to {} schema",
                    code, DEFAULT_SCHEMA
                );
                Ok(TenantHandle::with_default_schema(&self.context, false))
            }
        }
    }

    pub async fn resolve_headers(&self, headers: &HeaderMap) -> Result<TenantHandle> {
        let code = headers
            .get(STORE_CODE_HEADER)
            .and_then(|value| value.to_str().ok());
        self.resolve(code).await
    }
}
