use tigerlilly_api::{app, config::AppConfig, db, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tigerlilly_api=debug,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| panic!("configuration error: {}", e));
    tracing::info!(
        "starting Tigerlilly API on port {} against {}",
        config.port,
        config.redacted_database_url()
    );

    let pool = db::connect(&config)
        .await
        .unwrap_or_else(|e| panic!("database setup failed: {}", e));

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    let state = AppState::new(pool, config);
    axum::serve(listener, app(state)).await.expect("server");
}
