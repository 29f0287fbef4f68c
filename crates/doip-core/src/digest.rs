//! Digests used by the segment protocol.
//!
//! Provides two things:
//!   1. SHA-256 segment checksums: the 256-bit digest carried in every
//!      segment header and re-checked at reassembly
//!   2. BLAKE3 transfer fingerprints: a local, never-transmitted digest
//!      used to compare a source byte sequence with its reassembled output
//!
//! Neither is an authentication scheme. A checksum detects corruption, it
//! does not prove who produced the segment.

use sha2::{Digest, Sha256};

// ── SHA-256 ───────────────────────────────────────────────────────────────────

/// SHA-256 of a segment payload.
pub fn checksum(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// BLAKE3 fingerprint of a whole transfer.
pub fn fingerprint(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// True if two byte sequences have the same fingerprint.
pub fn verify_match(original: &[u8], reassembled: &[u8]) -> bool {
    original.len() == reassembled.len() && fingerprint(original) == fingerprint(reassembled)
}
