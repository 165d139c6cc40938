mod auth;
mod error;
mod policies;
mod problem;
mod report;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::{error, info};

use auth::TokenService;
use policy_desk_storage::Database;
use policy_desk_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url)
        .await
        .inspect_err(|err| error!(stage = "storage", error = %err, "failed to open database"))?;
    database
        .run_migrations()
        .await
        .inspect_err(|err| error!(stage = "storage", error = %err, "failed to run migrations"))?;

    let tokens = TokenService::new(&config.jwt_secret, config.token_ttl);
    let state = router::AppState::new(metrics, database, tokens);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
