mod auth;
mod chat;
mod config;
mod db;
mod meeting;
mod presence;
mod routes;
mod state;
mod ws;

use std::net::SocketAddr;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Huddle server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database (the message store collaborator)
    let db = db::init_db(&config.data_dir)?;

    // Load or generate signing secrets (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_secret(&config.data_dir, "jwt_secret")?;
    let meeting_token_secret =
        auth::jwt::load_or_generate_secret(&config.data_dir, "meeting_token_secret")?;

    let meeting_config = config.meeting.clone().unwrap_or_default();

    // Build application state
    let app_state = state::AppState {
        db,
        jwt_secret,
        meeting_token_secret,
        meeting_token_ttl_secs: meeting_config.token_ttl_secs,
        connections: ws::ConnectionRegistry::new(),
        typing: chat::typing::TypingTable::new(),
        meetings: meeting::MeetingRegistry::new(),
    };

    // Spawn the typing-expiry sweep so indicators lapse even when clients
    // never send an explicit stop
    chat::typing::spawn_expiry_sweep(app_state.typing.clone(), app_state.connections.clone());

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
