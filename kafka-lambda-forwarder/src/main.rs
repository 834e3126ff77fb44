//! Consume Kafka record batches and forward each one to a Lambda function.
use std::sync::Arc;

use anyhow::Context as _;
use rdkafka::consumer::Consumer;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kafka_lambda_forwarder::config::Config;
use kafka_lambda_forwarder::consumer::ConsumerLoop;
use kafka_lambda_forwarder::context::{ForwarderConsumer, ForwarderContext};
use kafka_lambda_forwarder::forwarder::Forwarder;
use kafka_lambda_forwarder::invoker::LambdaInvoker;
use kafka_lambda_forwarder::rebalance::RebalanceSeeker;
use kafka_lambda_forwarder::server;

async fn shutdown(tx: watch::Sender<()>) {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("Shutting down gracefully...");
    tx.send(()).ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rdkafka=warn")),
        )
        .init();

    let config = Config::init_with_defaults().context("invalid configuration")?;

    let recorder_handle = server::setup_metrics_recorder();
    let bind = config.bind_address();
    tokio::spawn(async move {
        let router = server::router(Some(recorder_handle));
        if let Err(e) = server::serve(router, &bind).await {
            tracing::error!(error = %e, "probe server exited");
        }
    });

    let seeker = config.seek_position().map(RebalanceSeeker::new);
    let consumer: ForwarderConsumer = config
        .consumer_client_config()
        .create_with_context(ForwarderContext::new(seeker))
        .context("failed to create consumer")?;
    consumer
        .subscribe(&[config.kafka_topic_name.as_str()])
        .context("failed to subscribe to topic")?;

    let invoker = Arc::new(LambdaInvoker::new(config.lambda_function_name.clone()).await);
    let forwarder = Forwarder::new(invoker);

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(shutdown(shutdown_tx));

    info!(
        topic = %config.kafka_topic_name,
        group = %config.kafka_group_id,
        function = %config.lambda_function_name,
        "Starting consumer loop"
    );

    ConsumerLoop::new(consumer, forwarder, config.kafka_max_poll_records)
        .run(shutdown_rx)
        .await?;

    Ok(())
}
