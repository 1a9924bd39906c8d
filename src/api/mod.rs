mod admin;
mod health;
mod in_store;
mod products;
mod stores;

use crate::context::DataContext;
use crate::migration::MigrationOrchestrator;
use crate::registry::RegistryHandle;
use crate::security::{admin_auth_middleware, AdminAuthConfig};
use crate::tenant::TenantResolver;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

pub use health::health_check;

pub struct AppState {
    pub context: DataContext,
    pub registry: RegistryHandle,
    pub resolver: TenantResolver,
    pub orchestrator: Arc<MigrationOrchestrator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(context: DataContext, orchestrator: Arc<MigrationOrchestrator>) -> Self {
        Self {
            registry: context.registry(),
            resolver: TenantResolver::new(context.clone()),
            context,
            orchestrator,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: Arc<AppState>, admin_auth: Arc<AdminAuthConfig>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/migrate", post(admin::run_migrations))
        .route("/admin/model", get(admin::tenant_model))
        .route_layer(middleware::from_fn_with_state(
            admin_auth,
            admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/stores", get(stores::list_stores).post(stores::upsert_store))
        .route(
            "/products",
            get(products::list_products).post(products::upsert_product),
        )
        .route(
            "/in-store/inventory",
            get(in_store::list_inventory).post(in_store::record_inventory),
        )
        .route("/in-store/catalogue", get(in_store::catalogue))
        .merge(admin_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use crate::migration::{FailurePolicy, Migrator};
    use crate::registry::{CatalogItem, TenantRecord};
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn app(admin_token: Option<&str>) -> (Arc<MemoryDatabase>, Router) {
        let (db, router, _) = app_with_context(admin_token);
        (db, router)
    }

    fn app_with_context(admin_token: Option<&str>) -> (Arc<MemoryDatabase>, Router, DataContext) {
        let db = Arc::new(MemoryDatabase::new());
        db.add_tenant(TenantRecord::new("ACME", "Acme", "Leeds", "acme_store"));
        db.add_product(CatalogItem {
            code: "TRF1".to_string(),
            name: "Truffle".to_string(),
            category: "box".to_string(),
            reference_price: Decimal::new(500, 2),
            discontinued: false,
        });
        db.add_product(CatalogItem {
            code: "BAR1".to_string(),
            name: "Bar".to_string(),
            category: "bar".to_string(),
            reference_price: Decimal::new(200, 2),
            discontinued: true,
        });

        let context = DataContext::new(db.clone(), db.clone());
        let orchestrator = MigrationOrchestrator::new(
            context.clone(),
            Migrator::new(db.clone(), "postgres"),
            FailurePolicy::Abort,
        );
        let state = Arc::new(AppState::new(context.clone(), Arc::new(orchestrator)));
        let admin = Arc::new(AdminAuthConfig::new(
            admin_token.map(str::to_string),
            vec![],
        ));

        (db, router(state, admin), context)
    }

    fn request(method: &str, uri: &str, store: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(store) = store {
            builder = builder.header("store-code", store);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_inventory_requires_resolved_store() {
        let (_, app) = app(None);

        let (status, body) = send(&app, request("GET", "/in-store/inventory", None, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden_tenant_context");

        let (status, _) = send(
            &app,
            request("GET", "/in-store/inventory", Some("NOPE"), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_record_inventory_roundtrip() {
        let (db, app) = app(None);
        let write = serde_json::json!({ "code": "trf1", "quantity": 7, "unit_price": "4.50" });

        let (status, body) = send(
            &app,
            request("POST", "/in-store/inventory", Some("acme"), Some(write)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "TRF1");
        assert_eq!(db.stock_rows("\"acme_store\".\"inventory\"").len(), 1);

        let (status, body) = send(
            &app,
            request("GET", "/in-store/catalogue", Some("ACME"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Truffle");
        assert_eq!(body[0]["quantity"], 7);
    }

    #[tokio::test]
    async fn test_record_inventory_rejects_bad_products() {
        let (_, app) = app(None);

        let unknown = serde_json::json!({ "code": "ZZZZ", "quantity": 1 });
        let (status, body) = send(
            &app,
            request("POST", "/in-store/inventory", Some("ACME"), Some(unknown)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "product_not_found");

        let discontinued = serde_json::json!({ "code": "BAR1", "quantity": 1 });
        let (status, _) = send(
            &app,
            request("POST", "/in-store/inventory", Some("ACME"), Some(discontinued)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_store_registration() {
        let (_, app) = app(None);

        let reserved = serde_json::json!({
            "code": "HQ", "name": "Head office", "city": "Leeds", "schema_name": "hq"
        });
        let (status, body) = send(&app, request("POST", "/stores", None, Some(reserved))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["schema"], "hq");

        let zenith = serde_json::json!({
            "code": "ZEN", "name": "Zenith", "city": "York", "schema_name": "zenith_store"
        });
        let (status, _) = send(&app, request("POST", "/stores", None, Some(zenith))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, request("GET", "/stores", None, None)).await;
        let schemas: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["schema_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(schemas, ["acme_store", "zenith_store"]);
    }

    #[tokio::test]
    async fn test_products_listed_by_name() {
        let (_, app) = app(None);

        let (status, body) = send(&app, request("GET", "/products", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["code"], "BAR1");
        assert_eq!(body[1]["code"], "TRF1");
    }

    #[tokio::test]
    async fn test_health() {
        let (db, app) = app(None);

        let (_, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(body["status"], "healthy");

        db.set_unreachable(true);
        let (_, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["registry_connected"], false);
    }

    fn admin_request(method: &str, uri: &str, token: &str) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        req
    }

    #[tokio::test]
    async fn test_admin_disabled_without_token() {
        let (_, app) = app(None);

        let (status, _) = send(&app, admin_request("POST", "/admin/migrate", "x")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_admin_migrate_runs_sweep() {
        let (db, app) = app(Some("secret"));

        let (status, _) = send(&app, admin_request("POST", "/admin/migrate", "wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, admin_request("POST", "/admin/migrate", "secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tenants"][0]["schema"], "acme_store");
        assert!(db.has_table("\"acme_store\".\"inventory\""));
    }

    #[tokio::test]
    async fn test_admin_model_is_design_time() {
        let (_, app) = app(Some("secret"));

        let (status, body) = send(
            &app,
            admin_request("GET", "/admin/model?schema=acme_store", "secret"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["design_time"], true);
        assert_eq!(body["model"]["default_schema"], "acme_store");

        let (status, _) = send(&app, admin_request("GET", "/admin/model?schema=hq", "secret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_model_only_compiles_registered_schemas() {
        let (db, app, context) = app_with_context(Some("secret"));
        let before = context.cache().compilations();

        for schema in ["ghost_one", "ghost_two", "ghost_three"] {
            let uri = format!("/admin/model?schema={}", schema);
            let (status, body) = send(&app, admin_request("GET", &uri, "secret")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error"], "unknown_schema");
        }
        assert_eq!(context.cache().compilations(), before);

        db.add_tenant(TenantRecord::new("GHO", "Ghost", "Hull", "ghost_one"));
        let (status, _) = send(
            &app,
            admin_request("GET", "/admin/model?schema=ghost_one", "secret"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(context.cache().compilations(), before + 1);
    }
}
