pub mod api;
pub mod config;
pub mod gateway;
pub mod logic;
pub mod model;
pub mod router;
pub mod seed;
pub mod session;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use gateway::{Gateway, GatewayError, MemoryGateway, SupabaseGateway};
pub use logic::{business_graph, BindingGraph, BoundViews};
pub use router::{app_routes, AppRouter, Navigation, NavigationOutcome, RouteGuard};
pub use session::{AuthStatus, SessionError, SessionManager, SessionStatus};

use std::sync::Arc;

use crate::config::AppConfig;

/// Pick the backend: Supabase when an endpoint is configured, otherwise the
/// seeded in-memory demo backend.
pub async fn connect_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn Gateway>> {
    match config.backend_endpoint() {
        Some(endpoint) => {
            log::info!("Using Supabase backend at {}", endpoint.url);
            let mut gateway = SupabaseGateway::new(&endpoint.url, &endpoint.publishable_key);
            if let Some(redirect) = &config.backend.email_redirect_to {
                gateway = gateway.with_email_redirect(redirect.clone());
            }
            Ok(Arc::new(gateway))
        }
        None => {
            log::warn!("No backend configured, running on the in-memory demo backend");
            let gateway = seed::demo_gateway();
            seed::load_seed_data(&gateway).await?;
            Ok(Arc::new(gateway))
        }
    }
}

/// Wire gateway, binding graph, session and router into the app shell
pub fn build_app(gateway: Arc<dyn Gateway>) -> anyhow::Result<axum::Router> {
    let session = SessionManager::new(gateway, business_graph()?);
    let router = AppRouter::new(app_routes(), session.clone());
    Ok(api::routes::create_router(handlers::AppState::new(
        session, router,
    )))
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = AppConfig::load()?;
    let app = build_app(connect_gateway(&config).await?)?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
