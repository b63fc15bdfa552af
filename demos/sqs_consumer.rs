use std::sync::Arc;

use anyhow::Context;
use castor::{
    BoxError, Consumer, Message, Pipeline, PipelineConfig, Producer,
    sqs::{SqsClientConfig, SqsTransport},
    telemetry::{LogFormat, init_logging},
};
use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    name: String,
}

/// Logs greetings and rejects anything that is not one.
struct GreetingConsumer;

impl Consumer for GreetingConsumer {
    async fn consume(&self, message: &Message) -> Result<(), BoxError> {
        let greeting: Greeting = serde_json::from_str(&message.body)?;
        tracing::info!(message_id = %message.id, name = %greeting.name, "hello");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    init_logging(LogFormat::Text).map_err(|e| anyhow::anyhow!(e))?;

    let client_config = SqsClientConfig::init_from_env().context("invalid sqs client config")?;
    let mut pipeline_config =
        PipelineConfig::init_from_env().context("invalid pipeline config")?;
    if std::env::var("CASTOR_WAIT_TIME_SECONDS").is_err() {
        pipeline_config = pipeline_config.with_wait_time_seconds(20);
    }

    let transport = Arc::new(SqsTransport::from_config(&client_config).await);

    if std::env::var("SEND_GREETING").is_ok() {
        let producer = Producer::new(Arc::clone(&transport));
        producer
            .send(
                &pipeline_config.queue_name,
                &Greeting {
                    name: "castor".to_string(),
                },
            )
            .await
            .context("failed to send greeting")?;
    }

    let pipeline = Pipeline::builder_shared(transport, pipeline_config)
        .consumer(GreetingConsumer)
        .build()
        .await?;

    tracing::info!(queue = %pipeline.queue().name(), "initialized sqs pipeline");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            cancel.cancel();
        }
    });

    let report = pipeline.run(cancel).await;

    println!("done: {report:?}");

    Ok(())
}
