//! End-to-end transfer: source bytes in, JSON report out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use rand::RngCore;

use doip_core::config::DoipConfig;
use doip_services::run_transfer;

/// Size of the generated source when no input file is given.
const GENERATED_SOURCE_LEN: usize = 1024 * 1024;

pub async fn run(config: &DoipConfig, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let source = match &input {
        Some(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = data.len(), "source loaded");
            Bytes::from(data)
        }
        None => {
            let mut data = vec![0u8; GENERATED_SOURCE_LEN];
            rand::thread_rng().fill_bytes(&mut data);
            tracing::info!(bytes = data.len(), "generated random source");
            Bytes::from(data)
        }
    };

    let outcome = run_transfer(config, source)
        .await
        .context("transfer failed")?;

    if let Some(path) = &output {
        tokio::fs::write(path, &outcome.output)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = outcome.output.len(), "output written");
    }

    let report = serde_json::to_string_pretty(&outcome.report).context("failed to encode report")?;
    println!("{report}");
    Ok(())
}
