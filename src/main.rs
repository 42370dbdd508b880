use axum::serve;
use seshuns_session::config::AppConfig;
use seshuns_session::{build_app, connect_gateway};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_default_env()
        .init();

    println!("Seshuns: session and data-binding shell");

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let gateway = connect_gateway(&config).await?;
    let app = build_app(gateway)?;

    run_server(app, &config).await
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("Seshuns running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
