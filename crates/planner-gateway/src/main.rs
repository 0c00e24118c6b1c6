use std::sync::Arc;

use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planner_gateway=info,planner_notifier=info,tower_http=info".into()),
        )
        .init();

    // load config: explicit path via PLANNER_CONFIG > ~/.planner/planner.toml
    let config_path = std::env::var("PLANNER_CONFIG").ok();
    let config = planner_core::PlannerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        planner_core::PlannerConfig::default()
    });

    // initialize SQLite database — single file for all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // run all schema migrations (idempotent)
    planner_events::db::init_db(&db)?;
    planner_directory::db::init_db(&db)?;
    info!("database migrations complete");
    drop(db);

    // build subsystems — each gets its own connection for thread safety
    let events = Arc::new(planner_events::EventService::new(rusqlite::Connection::open(
        &db_path,
    )?));
    let directory = Arc::new(planner_directory::Directory::new(rusqlite::Connection::open(
        &db_path,
    )?));

    let push: Arc<dyn planner_push::PushDispatcher> =
        match (&config.push.endpoint, &config.push.server_key) {
            (Some(endpoint), Some(key)) => Arc::new(planner_push::HttpPushDispatcher::new(
                endpoint.clone(),
                key.clone(),
            )),
            _ => {
                info!("no push endpoint configured; falling back to log-only dispatcher");
                Arc::new(planner_push::LogPushDispatcher)
            }
        };

    // The notifier polls on its own connections so gateway traffic never
    // contends with the tick loop.
    let notifier = Arc::new(planner_notifier::Notifier::new(
        Arc::new(planner_events::EventService::new(rusqlite::Connection::open(&db_path)?)),
        Arc::new(planner_directory::Directory::new(rusqlite::Connection::open(&db_path)?)),
        push,
        Arc::new(planner_notifier::SystemClock),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let notifier_task = tokio::spawn(notifier.run(shutdown_rx));

    let state = Arc::new(app::AppState {
        config: config.clone(),
        events,
        directory,
    });
    let router = app::build_router(state);

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "planner gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Stop the notifier loop; an in-flight tick is allowed to finish.
    let _ = shutdown_tx.send(true);
    let _ = notifier_task.await;
    info!("planner gateway stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
