use std::sync::Arc;

use mailminder::api::{ApiState, api_routes};
use mailminder::config::{PipelineConfig, ServerConfig};
use mailminder::ingest::{FixtureSource, MessageSource, spawn_poll_task};
use mailminder::pipeline::Pipeline;
use mailminder::store::{LibSqlStore, MessageStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();

    tracing::info!(
        port = server_config.port,
        db = %server_config.db_path.display(),
        "MailMinder v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let store: Arc<dyn MessageStore> =
        Arc::new(LibSqlStore::new_local(&server_config.db_path).await?);
    let pipeline = Arc::new(Pipeline::from_config(pipeline_config)?);
    let source: Arc<dyn MessageSource> =
        Arc::new(FixtureSource::new(server_config.fixture_path.clone()));

    if server_config.seed_demo {
        let (fetched, processed) =
            mailminder::ingest::poll_once(store.as_ref(), &pipeline, source.as_ref()).await?;
        tracing::info!(fetched, processed, "Seeded mailbox from source");
    }

    let mut poll_shutdown = None;
    if server_config.poll_interval_secs > 0 {
        let (_handle, shutdown) = spawn_poll_task(
            Arc::clone(&store),
            Arc::clone(&pipeline),
            Arc::clone(&source),
            server_config.poll_interval_secs,
        );
        poll_shutdown = Some(shutdown);
    }

    let state = ApiState {
        store,
        pipeline,
        source,
        api_key: server_config.api_key.clone(),
    };
    let app = api_routes(state);

    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port)).await?;
    tracing::info!(port = server_config.port, "HTTP server listening");
    axum::serve(listener, app).await?;

    if let Some(shutdown) = poll_shutdown {
        shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    Ok(())
}
