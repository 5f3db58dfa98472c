use crate::{
    arguments::Arguments,
    countdown::{CountdownConfig, CountdownRegistry},
    database::Postgres,
    events::EventEmitter,
    lifecycle::Lifecycle,
};
use std::sync::Arc;
use tokio::task;

/// Wires the lifecycle side of the engine together and runs it until a
/// shutdown signal arrives. The [`crate::auctioneer::Auctioneer`]
/// facade is constructed by the request handling layer embedding this
/// crate; the binary only drives recovery and expiry. The returned
/// future only resolves on shutdown.
pub async fn run(args: Arguments) {
    let postgres = Postgres::new(args.db_url.as_str()).expect("failed to create database");
    let store = Arc::new(postgres);

    let emitter = EventEmitter::new(args.event_channel_capacity);
    let (registry, expired) = CountdownRegistry::new(
        CountdownConfig {
            tick_interval: args.countdown_tick,
        },
        emitter.clone(),
    );
    let registry = Arc::new(registry);

    let lifecycle = Arc::new(Lifecycle::new(store, registry, emitter));
    lifecycle
        .recover()
        .await
        .expect("failed to recover active auction countdowns");

    let expiry_loop = task::spawn(lifecycle.run_forever(expired));

    tokio::select! {
        result = expiry_loop => tracing::error!(?result, "expiry loop exited"),
        _ = shutdown_signal() => {
            tracing::info!("gracefully shutting down");
        }
    };
}

#[cfg(unix)]
async fn shutdown_signal() {
    // Intercept main signals for graceful shutdown.
    // Kubernetes sends sigterm, whereas locally sigint (ctrl-c) is most
    // common.
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .unwrap()
            .recv()
            .await
    };
    let sigint = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .unwrap()
            .recv()
            .await;
    };
    futures::pin_mut!(sigint);
    futures::pin_mut!(sigterm);
    futures::future::select(sigterm, sigint).await;
}

#[cfg(windows)]
async fn shutdown_signal() {
    // We don't support signal handling on windows.
    std::future::pending().await
}
