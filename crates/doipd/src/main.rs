//! doipd: DOIP distribution node.
//!
//! Usage:
//!   doipd [simulate] [INPUT] [OUTPUT]   run a transfer through the configured hops
//!   doipd admit                         judge hex-encoded packets read from stdin

use anyhow::Result;

use doip_core::config::DoipConfig;

mod admit;
mod simulate;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = DoipConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        DoipConfig::default()
    });

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let command = if matches!(args.first().map(String::as_str), Some("admit" | "simulate")) {
        args.remove(0)
    } else {
        "simulate".to_string()
    };
    tracing::info!(command = %command, hops = ?config.node.hops, "doipd starting");

    match command.as_str() {
        "admit" => admit::run(&config).await,
        _ => {
            let input = args.first().map(Into::into);
            let output = args.get(1).map(Into::into);
            simulate::run(&config, input, output).await
        }
    }
}
