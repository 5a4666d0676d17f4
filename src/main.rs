use clap::Parser;
use std::env;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fungimate::config::ConfigContext;
use fungimate::gateway::OllamaGateway;
use fungimate::{server, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigContext::parse();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "fungimate=debug");
    }
    telemetry::init(config.jaeger_endpoint.as_deref())?;

    info!(
        classification_model = %config.classification_model,
        chat_model = %config.chat_model,
        image_model = %config.image_model,
        ollama_url = %config.ollama_url,
        "Starting FungiMate job server"
    );

    let gateway = OllamaGateway::new(&config.ollama_url, config.inference_timeout())?;

    let token = CancellationToken::new();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
            token.cancel();
        }
    });

    let app = tokio::spawn(server::serve(token, config, Arc::new(gateway)));
    if let Err(err) = app.await? {
        error!("Server error: {}", err);
        telemetry::shutdown();
        return Err(err.into());
    }

    info!("Shutting down.");
    telemetry::shutdown();

    Ok(())
}
