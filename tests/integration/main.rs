//! DOIP integration test harness.
//!
//! Scenarios run the real crates in-process: segmenter → governance hops →
//! reassembler, plus the admission gate over packet streams.
//!
//!   cargo test --test integration

use bytes::Bytes;
use rand::{rngs::StdRng, RngCore, SeedableRng};

use doip_core::config::DoipConfig;
use doip_core::policy::NodeClassification;
use doip_core::wire::AdmissionHeader;

mod admission;
mod config;
mod framing;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const MIB: usize = 1024 * 1024;
pub const SEGMENT_SIZE: usize = 64 * 1024;

/// Deterministic pseudo-random source bytes.
pub fn source(len: usize, seed: u64) -> Bytes {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    Bytes::from(data)
}

/// Default config routed through `hops`, with a fixed worker count.
pub fn config_with_hops(hops: &[NodeClassification]) -> DoipConfig {
    let mut config = DoipConfig::default();
    config.node.hops = hops.to_vec();
    config.segmenter.workers = 4;
    config
}

/// A v1 admission packet carrying `payload` after the header.
pub fn packet(policy_id: u32, payload: &[u8]) -> Vec<u8> {
    versioned_packet(1, policy_id, payload)
}

pub fn versioned_packet(version: u8, policy_id: u32, payload: &[u8]) -> Vec<u8> {
    let header = AdmissionHeader::new(version, 0, 1, 1_700_000_000, policy_id)
        .expect("version fits in a nibble");
    let mut out = header.encode().to_vec();
    out.extend_from_slice(payload);
    out
}
