//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the ordering API.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::audit::AuditTrail;
use crate::auth::{JwtKeys, auth_middleware};
use crate::config::AppConfig;
use crate::feed::LiveOrderFeed;
use crate::handlers;
use crate::lifecycle::OrderLifecycle;
use crate::orders::OrderService;
use crate::registry::TableRegistry;
use crate::sequence::SequenceAllocator;
use crate::telemetry::trace_id_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub jwt_keys: Arc<JwtKeys>,
    pub orders: OrderService,
    pub lifecycle: OrderLifecycle,
    pub tables: TableRegistry,
    pub feed: LiveOrderFeed,
    pub audit: AuditTrail,
    /// Cancelled when the server begins shutting down; ends open feed streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let jwt_keys = Arc::new(JwtKeys::from_secret(config.jwt_secret_or_dev().as_bytes()));
        let audit = AuditTrail::new(db.clone());
        let allocator = Arc::new(SequenceAllocator::new());

        Self {
            orders: OrderService::new(db.clone(), allocator, &config),
            lifecycle: OrderLifecycle::new(db.clone(), audit.clone(), config.request_timeout()),
            tables: TableRegistry::new(db.clone(), audit.clone(), &config),
            feed: LiveOrderFeed::new(db.clone(), &config),
            config: Arc::new(config),
            db,
            jwt_keys,
            audit,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(Arc::clone(&state.jwt_keys), auth_middleware);

    let protected = Router::new()
        .route("/api/v1/orders/stream", get(handlers::feed::order_stream))
        .route("/api/v1/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/api/v1/orders/{id}/status",
            patch(handlers::orders::update_order_status),
        )
        .route("/api/v1/items", get(handlers::items::list_items))
        .route(
            "/api/v1/items/{id}/availability",
            patch(handlers::items::update_availability),
        )
        .route(
            "/api/v1/tables",
            get(handlers::tables::list_tables).post(handlers::tables::create_tables),
        )
        .route("/api/v1/tables/{id}", delete(handlers::tables::delete_table))
        .route_layer(auth.clone());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/v1/menu/{tenant_code}", get(handlers::menu::get_menu))
        // Customers place orders anonymously; listing needs a principal.
        .route(
            "/api/v1/orders",
            get(handlers::orders::list_orders)
                .route_layer(auth)
                .post(handlers::orders::create_order),
        )
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();
    let state = AppState::new(config, db);
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested; closing live feeds");
            shutdown.cancel();
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::menu::get_menu,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::feed::order_stream,
        crate::handlers::items::list_items,
        crate::handlers::items::update_availability,
        crate::handlers::tables::list_tables,
        crate::handlers::tables::create_tables,
        crate::handlers::tables::delete_table,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::orders::CreateOrderRequest,
            crate::orders::OrderView,
            crate::orders::OrderLineView,
            crate::pricing::LineRequest,
            crate::pricing::SelectedCustomization,
            crate::pricing::CustomizationSnapshot,
            crate::lifecycle::OrderStatus,
            crate::handlers::orders::StatusUpdateRequest,
            crate::feed::FeedSnapshot,
            crate::handlers::menu::MenuResponse,
            crate::handlers::menu::MenuItemView,
            crate::handlers::menu::MenuCustomizationView,
            crate::models::item_customization::CustomizationAction,
            crate::handlers::items::AvailabilityUpdate,
            crate::handlers::items::ItemAvailability,
            crate::handlers::items::ItemCatalog,
            crate::handlers::items::CatalogItem,
            crate::registry::CreateTablesRequest,
            crate::registry::TableView,
            crate::registry::TableOutcome,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "root", description = "Service information"),
        (name = "menu", description = "Public menu and item availability"),
        (name = "orders", description = "Order placement, lifecycle and live board"),
        (name = "tables", description = "Table identities and QR targets"),
    ),
    info(
        title = "Tableside Ordering API",
        description = "Multi-tenant restaurant order lifecycle and sequencing",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
