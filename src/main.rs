use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use merge_fee_bot::blockchain::HttpLedger;
use merge_fee_bot::config::Config;
use merge_fee_bot::engine::{Engine, HttpTokenValidator};
use merge_fee_bot::events::consumer;
use merge_fee_bot::github::OctocrabHost;
use merge_fee_bot::metrics::Metrics;
use merge_fee_bot::queue::EventQueue;
use merge_fee_bot::reconcile;
use merge_fee_bot::server::{build_router, AppState};
use merge_fee_bot::types::RepoId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merge_fee_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load_default().context("loading configuration")?);

    let metrics = Arc::new(Metrics::new(&config.service_name).context("registering metrics")?);

    let repo = RepoId::new(&config.github.repo_owner, &config.github.repo_name);
    let github = Arc::new(
        OctocrabHost::from_token(&config.github.token, repo)
            .context("building GitHub client")?,
    );
    let ledger = Arc::new(HttpLedger::new(config.blockchain.clone()));
    let validator = Arc::new(HttpTokenValidator::new());

    let engine = Arc::new(Engine::new(
        config.clone(),
        github,
        ledger,
        validator,
        metrics.clone(),
    ));

    let shutdown = CancellationToken::new();

    // Separate channels for publishing and consuming.
    let publish_queue = EventQueue::connect(&config.queue.url, &config.queue.queue_name)
        .await
        .context("connecting publish channel")?;
    let consume_queue = EventQueue::connect(&config.queue.url, &config.queue.queue_name)
        .await
        .context("connecting consume channel")?;

    let consumer_task = tokio::spawn({
        let engine = engine.clone();
        let shutdown = shutdown.clone();
        let workers = config.queue.workers;
        async move { consumer::run(&consume_queue, engine, workers, shutdown).await }
    });

    let reconciler_task = tokio::spawn(reconcile::run(
        engine.clone(),
        config.timeouts.reconcile_interval(),
        shutdown.clone(),
    ));

    let app_state = AppState::new(
        config.github.webhook_secret.as_bytes(),
        Arc::new(publish_queue),
        metrics,
    );
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                shutdown.cancel();
            }
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();

    reconciler_task.await.context("joining reconciler")?;
    consumer_task
        .await
        .context("joining consumer")?
        .context("consumer failed")?;

    Ok(())
}
