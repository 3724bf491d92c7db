use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::middleware::JwtSecret;
use crate::meeting::admission;
use crate::presence;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on the REST surface: 30 requests per minute per IP.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2) // 1 token every 2 seconds = 30 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let api_routes = Router::new()
        .route("/api/presence", axum::routing::get(presence::get_presence))
        .route(
            "/api/meetings",
            axum::routing::post(admission::open_meeting),
        )
        .route(
            "/api/meetings/{meeting_id}",
            axum::routing::delete(admission::close_meeting),
        )
        .route(
            "/api/meetings/{meeting_id}/waiting",
            axum::routing::get(admission::waiting_list),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    Router::new()
        .merge(api_routes)
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}
