mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use banter_api::AppStateInner;
use banter_db::Database;
use banter_gateway::connection;
use banter_gateway::dispatcher::Dispatcher;

use crate::config::ServerConfig;

#[derive(Clone)]
struct GatewayState {
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "banter=debug,banter_api=debug,banter_gateway=debug,banter_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state = AppStateInner::new(
        db.clone(),
        config.jwt_secret.clone(),
        config.token_ttl_days,
        dispatcher.clone(),
    );

    let gateway = GatewayState {
        dispatcher,
        db,
        jwt_secret: config.jwt_secret.clone(),
    };

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway);

    let app = Router::new()
        .merge(banter_api::router(app_state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr()?;
    info!("Banter server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db, state.jwt_secret)
    })
}
