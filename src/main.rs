use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_checkin::config::AppConfig;
use event_checkin::database;
use event_checkin::identity::JwtPayloadVerifier;
use event_checkin::web::{self, middleware::rate_limit::RateLimiter, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");
    info!(database_url = %config.database_url, "connecting to database");

    let pool = database::connect(&config.database_url)
        .await
        .expect("cannot open database");

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let _sweeper = rate_limiter.spawn_sweeper();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("cannot parse host/port");

    let state = AppState {
        pool,
        verifier: Arc::new(JwtPayloadVerifier),
        rate_limiter,
        config: Arc::new(config),
    };
    let app = web::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("cannot bind listener");
    let bound_addr = listener.local_addr().expect("listener has no local address");
    info!("listening on http://{}", bound_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
