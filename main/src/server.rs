use std::sync::Arc;

use api_router::{api_state::ApiState, app};
use common::{storage::client::connect_store, utils::config::get_config};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let store = connect_store(&config)?;
    let api_state = ApiState::new(store, &config)?;

    if config.reload_on_start {
        let orchestrator = Arc::clone(&api_state.orchestrator);
        tokio::spawn(async move {
            match orchestrator.run_full_reload().await {
                Ok(report) => info!(
                    documents_indexed = report.documents_indexed(),
                    failures = report.failure_count(),
                    "startup reload finished"
                ),
                Err(err) => error!(error = %err, "startup reload failed"),
            }
        });
    }

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app(api_state)).await?;

    Ok(())
}
