use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tikiti_api::config::{init_tracing, load_config};
use tikiti_api::events::{process_events, EventSender};
use tikiti_api::handlers::AppServices;
use tikiti_api::mpesa::{DarajaClient, StkGateway};
use tikiti_api::{api_v1_routes, db, openapi, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?,
    );
    if config.auto_migrate {
        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;
    }

    let (tx, rx) = mpsc::channel(1000);
    let event_sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let gateway: Arc<dyn StkGateway> = Arc::new(DarajaClient::new(config.mpesa.clone()));
    if config.mpesa.consumer_key.is_empty() {
        warn!("mpesa consumer_key is not configured; STK pushes will be rejected");
    }

    let services = AppServices::new(db.clone(), gateway, event_sender.clone(), &config);
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    });

    let cors = match config.cors_allowed_origins.as_deref() {
        Some(origins) if !origins.trim().is_empty() => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::permissive(),
    };

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "tikiti-api is running" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
