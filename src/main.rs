use std::sync::Arc;

use quiz_runner::{
    AppState, api::routes::create_router, browser::ChromeRenderer, config::Config,
    strategy::StrategyRegistry,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quiz_runner=debug,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;

    let renderer = ChromeRenderer::new(
        config.chrome_executable.clone(),
        config.navigation_timeout,
        config.settle_delay,
    );
    let strategies = StrategyRegistry::default();
    info!(
        max_sessions = config.max_browser_sessions,
        deadline_secs = config.job_deadline.as_secs(),
        strategies = ?strategies.names(),
        "starting quiz runner"
    );

    let app_state = AppState::new(config, Arc::new(renderer), strategies)?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;
    info!(%server_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
