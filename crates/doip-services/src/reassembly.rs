//! Reassembly: checksum verification, ordering, and gap detection.
//!
//! The reassembler consumes one transfer's segments exactly once. Under the
//! default `IntegrityPolicy::Abort` a single corrupt segment fails the whole
//! call and no output is produced. Missing segments are not an error: the
//! output is returned with an `IncompleteWarning` and the gaps collapsed.

use std::collections::BTreeSet;
use std::fmt;

use bytes::{Bytes, BytesMut};

use doip_core::config::IntegrityPolicy;
use doip_core::wire::{self, WireError};

/// Upper bound on the missing sequence numbers listed in a result.
pub const MAX_REPORTED_MISSING: usize = 1024;

/// Fewer distinct sequence numbers arrived than the transfer declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteWarning {
    pub expected: u32,
    pub got: u32,
}

impl fmt::Display for IncompleteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing segments: expected {}, got {}",
            self.expected, self.got
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    #[error("no segments to reassemble")]
    EmptyInput,

    #[error("segment {index} is malformed: {source}")]
    Format {
        index: usize,
        #[source]
        source: WireError,
    },

    #[error("checksum mismatch in segment {seq_num}")]
    Integrity { seq_num: u32 },
}

/// Output of a reassembly.
#[derive(Debug, Clone)]
pub struct Reassembled {
    /// Concatenated payloads in sequence order.
    pub data: Bytes,
    /// Transfer id read from the first segment.
    pub segment_id: u32,
    /// `total_segments` read from the first segment.
    pub expected: u32,
    /// Distinct sequence numbers that contributed payload.
    pub received: u32,
    /// Sequence numbers in `[0, expected)` that never arrived, ascending,
    /// capped at `MAX_REPORTED_MISSING` entries.
    pub missing: Vec<u32>,
    /// Sequence numbers skipped for failing their checksum
    /// (`IntegrityPolicy::SkipCorrupt` only).
    pub corrupt: Vec<u32>,
    pub warning: Option<IncompleteWarning>,
}

impl Reassembled {
    pub fn is_complete(&self) -> bool {
        self.warning.is_none()
    }
}

/// Verifies and concatenates one transfer's segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reassembler {
    integrity: IntegrityPolicy,
}

impl Reassembler {
    pub fn new(integrity: IntegrityPolicy) -> Self {
        Self { integrity }
    }

    pub fn integrity(&self) -> IntegrityPolicy {
        self.integrity
    }

    /// Reassemble encoded segments, given in any order.
    pub fn reassemble<S: AsRef<[u8]>>(&self, segments: &[S]) -> Result<Reassembled, ReassemblyError> {
        let first = segments.first().ok_or(ReassemblyError::EmptyInput)?;
        let (first_header, _) = wire::decode_segment(first.as_ref())
            .map_err(|source| ReassemblyError::Format { index: 0, source })?;
        let expected = first_header.total_segments.get();
        let segment_id = first_header.segment_id.get();

        let mut parsed: Vec<(u32, &[u8])> = Vec::with_capacity(segments.len());
        let mut corrupt = Vec::new();

        for (index, buf) in segments.iter().enumerate() {
            let (header, payload) = wire::decode_segment(buf.as_ref())
                .map_err(|source| ReassemblyError::Format { index, source })?;
            let seq_num = header.seq_num.get();

            if header.segment_id.get() != segment_id {
                tracing::warn!(
                    seq_num,
                    expected_id = segment_id,
                    found_id = header.segment_id.get(),
                    "segment from a different transfer"
                );
            }

            if !header.verify(payload) {
                match self.integrity {
                    IntegrityPolicy::Abort => {
                        tracing::warn!(seq_num, "checksum mismatch, aborting reassembly");
                        return Err(ReassemblyError::Integrity { seq_num });
                    }
                    IntegrityPolicy::SkipCorrupt => {
                        tracing::warn!(seq_num, "checksum mismatch, treating segment as missing");
                        corrupt.push(seq_num);
                        continue;
                    }
                }
            }

            parsed.push((seq_num, payload));
        }

        // Stable: duplicates keep their arrival order.
        parsed.sort_by_key(|(seq_num, _)| *seq_num);

        let present: BTreeSet<u32> = parsed.iter().map(|(seq_num, _)| *seq_num).collect();
        let received = present.len() as u32;

        let warning = if received < expected {
            let w = IncompleteWarning {
                expected,
                got: received,
            };
            tracing::warn!(expected, got = received, segment_id, "{w}");
            Some(w)
        } else {
            None
        };

        let missing = if warning.is_some() {
            (0..expected)
                .filter(|seq_num| !present.contains(seq_num))
                .take(MAX_REPORTED_MISSING)
                .collect()
        } else {
            Vec::new()
        };

        let total_len: usize = parsed.iter().map(|(_, p)| p.len()).sum();
        let mut data = BytesMut::with_capacity(total_len);
        for (_, payload) in &parsed {
            data.extend_from_slice(payload);
        }

        tracing::info!(
            segment_id,
            bytes = total_len,
            segments = parsed.len(),
            complete = warning.is_none(),
            "reassembly complete"
        );

        Ok(Reassembled {
            data: data.freeze(),
            segment_id,
            expected,
            received,
            missing,
            corrupt,
            warning,
        })
    }
}

/// Reassemble with the default abort-on-corruption policy.
pub fn reassemble<S: AsRef<[u8]>>(segments: &[S]) -> Result<Reassembled, ReassemblyError> {
    Reassembler::default().reassemble(segments)
}
