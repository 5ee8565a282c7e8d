use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::get,
    },
    sqlx::postgres::PgPoolOptions,
    std::{env, time::Duration},
    tokio::{signal, sync::watch},
    tower_http::timeout::TimeoutLayer,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let state = pay_recon::AppState { pool: pool.clone() };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = tokio::spawn(pay_recon::services::reporter::run_reporter(
        pool,
        Duration::from_secs(600),
        chrono::Duration::hours(pay_recon::services::reconcile::FALLBACK_WINDOW_HOURS),
        shutdown_rx,
    ));

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/payapp/feedback",
            // The gateway sends GET or POST depending on merchant config;
            // both must land on the same handler.
            get(pay_recon::adapters::payapp::feedback_handler)
                .post(pay_recon::adapters::payapp::feedback_handler),
        )
        .layer(
            tower::ServiceBuilder::new()
                .layer(TimeoutLayer::new(Duration::from_secs(10)))
                // gateway payloads are tiny form bodies
                .layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    shutdown_tx.send(true).ok();
    reporter.await.ok();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
