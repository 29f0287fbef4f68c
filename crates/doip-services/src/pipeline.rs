//! End-to-end transfer simulation: split, route through governance hops,
//! reassemble, and compare against the source.

use bytes::Bytes;
use serde::Serialize;

use doip_core::config::DoipConfig;
use doip_core::digest;

use crate::governance::enforce_route;
use crate::reassembly::{IncompleteWarning, Reassembler, ReassemblyError, MAX_REPORTED_MISSING};
use crate::segmenter::{new_segment_id, SegmentError, Segmenter};

/// Summary of one simulated transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub segment_id: u32,
    pub source_bytes: usize,
    pub segments_created: usize,
    pub hops: Vec<String>,
    pub dropped_per_hop: Vec<usize>,
    pub forwarded: usize,
    pub expected: u32,
    pub received: u32,
    pub missing: Vec<u32>,
    pub corrupt: Vec<u32>,
    pub output_bytes: usize,
    /// Output is byte-identical to the source.
    pub matched: bool,
    pub warning: Option<String>,
}

/// Report plus the reassembled bytes.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub report: TransferReport,
    pub output: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("segmentation failed: {0}")]
    Segment(#[from] SegmentError),
    #[error("reassembly failed: {0}")]
    Reassembly(#[from] ReassemblyError),
}

/// Run `source` through the pipeline described by `config`.
///
/// Governance removing every segment is reported, not raised: the output
/// is empty and `matched` is false unless the source was empty too.
pub async fn run_transfer(config: &DoipConfig, source: Bytes) -> Result<TransferOutcome, TransferError> {
    let segmenter = Segmenter::from_config(&config.segmenter)?;
    let workers = match config.segmenter.workers {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        n => n,
    };

    let segment_id = new_segment_id();
    let segments = segmenter
        .split_concurrent(source.clone(), segment_id, workers)
        .await?;
    let segments_created = segments.len();
    let expected = segments_created as u32;

    let route = enforce_route(segments, &config.node.hops);
    let forwarded = route.forwarded.len();

    let (output, received, missing, corrupt, warning) = if route.forwarded.is_empty() {
        let missing = (0..expected).take(MAX_REPORTED_MISSING).collect();
        let warning = (expected > 0).then(|| IncompleteWarning { expected, got: 0 }.to_string());
        if warning.is_some() {
            tracing::warn!(expected, "every segment was removed in transit");
        }
        (Bytes::new(), 0, missing, Vec::new(), warning)
    } else {
        let result = Reassembler::new(config.reassembly.integrity).reassemble(&route.forwarded)?;
        (
            result.data,
            result.received,
            result.missing,
            result.corrupt,
            result.warning.map(|w| w.to_string()),
        )
    };

    let matched = digest::verify_match(&source, &output);
    if matched {
        tracing::info!(segment_id, "reassembled content matches source");
    } else {
        tracing::warn!(
            segment_id,
            source = hex::encode(&digest::fingerprint(&source)[..8]),
            output = hex::encode(&digest::fingerprint(&output)[..8]),
            "reassembled content differs from source"
        );
    }

    let report = TransferReport {
        segment_id,
        source_bytes: source.len(),
        segments_created,
        hops: config.node.hops.iter().map(|h| h.to_string()).collect(),
        dropped_per_hop: route.dropped_per_hop,
        forwarded,
        expected,
        received,
        missing,
        corrupt,
        output_bytes: output.len(),
        matched,
        warning,
    };

    Ok(TransferOutcome { report, output })
}
