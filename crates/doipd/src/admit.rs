//! Packet admission over stdin: one hex-encoded packet per line, one JSON
//! decision per line on stdout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use doip_core::config::DoipConfig;
use doip_services::admission::TaggedPacket;
use doip_services::{AdmissionGate, AdmissionWorker, Decision};

const MAX_IN_FLIGHT: usize = 64;

pub async fn run(config: &DoipConfig) -> Result<()> {
    let table = config.policy.table();
    tracing::info!(policies = table.len(), dense = table.is_dense(), "policy table loaded");
    let gate = AdmissionGate::new(Arc::new(table));

    let (packet_tx, packet_rx) = mpsc::channel::<TaggedPacket>(MAX_IN_FLIGHT);
    let (decision_tx, mut decision_rx) = mpsc::channel::<(u64, Decision)>(MAX_IN_FLIGHT);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let worker = AdmissionWorker::new(gate, packet_rx, decision_tx, shutdown_rx, MAX_IN_FLIGHT);
    let worker_handle = tokio::spawn(worker.run());

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                interrupted.store(true, Ordering::SeqCst);
                let _ = shutdown_tx.send(());
            }
        });
    }

    let reader = tokio::spawn(async move {
        feed_packets(BufReader::new(tokio::io::stdin()), packet_tx).await
    });

    let (mut forwarded, mut dropped) = (0usize, 0usize);
    while let Some((tag, decision)) = decision_rx.recv().await {
        if decision.is_forward() {
            forwarded += 1;
        } else {
            dropped += 1;
        }
        let mut line = serde_json::to_value(&decision).context("failed to encode decision")?;
        if let Some(obj) = line.as_object_mut() {
            obj.insert("packet".into(), tag.into());
        }
        println!("{line}");
    }

    worker_handle.await.context("admission worker panicked")?;
    // After an interrupt the reader may still be parked on stdin.
    if interrupted.load(Ordering::SeqCst) {
        reader.abort();
    } else {
        let sent = reader.await.context("stdin reader panicked")??;
        tracing::debug!(sent, "stdin exhausted");
    }
    tracing::info!(forwarded, dropped, "admission complete");
    Ok(())
}

/// Decode hex lines from `input` and queue them for admission. Each
/// non-empty line consumes one tag, even when it is not valid hex.
/// Returns the number of packets queued.
async fn feed_packets<R>(input: R, packet_tx: mpsc::Sender<TaggedPacket>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut tag = 0u64;
    let mut sent = 0u64;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match hex::decode(line) {
            Ok(packet) => {
                if packet_tx.send((tag, Bytes::from(packet))).await.is_err() {
                    break;
                }
                sent += 1;
            }
            Err(e) => tracing::warn!(line = tag, error = %e, "skipping non-hex input"),
        }
        tag += 1;
    }
    Ok(sent)
}
