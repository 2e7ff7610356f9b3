mod api;
mod middleware;
mod scheduler;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use kidswear_services::{PgStore, Services};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = kidswear_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(?config, "starting kidswear-server");

    let pool_config = kidswear_db::PoolConfig::from_app_config(&config);
    let pool = kidswear_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = kidswear_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let services = Services::from_config(Arc::new(PgStore::new(pool)), &config);
    let _scheduler =
        scheduler::build_scheduler(services.ledger.clone(), &config.alert_scan_cron).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        kidswear_core::Environment::Development
    ))?;
    let app = build_app(AppState { services }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
