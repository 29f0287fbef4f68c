//! Governance filter: a distribution node enforcing a sensitivity
//! threshold on the segments passing through it.
//!
//! Each filter is one hop. A multi-hop path is a fold over hops, each hop
//! seeing only what the previous one forwarded, so a segment removed at one
//! hop can never reappear downstream. Rejection is an expected outcome and
//! is returned as a count, never as an error.

use bytes::Bytes;

use doip_core::policy::NodeClassification;

use crate::segment::Segment;

/// Result of passing a batch through one node.
#[derive(Debug, Clone, Default)]
pub struct Enforcement {
    /// Segments allowed through, in input order.
    pub forwarded: Vec<Segment>,
    /// Segments removed by policy.
    pub dropped: usize,
    /// Raw buffers that did not decode as segments.
    pub malformed: usize,
}

/// One distribution node.
#[derive(Debug, Clone, Copy, Default)]
pub struct GovernanceFilter {
    classification: NodeClassification,
}

impl GovernanceFilter {
    pub fn new(classification: NodeClassification) -> Self {
        Self { classification }
    }

    pub fn classification(&self) -> NodeClassification {
        self.classification
    }

    /// True if this node may forward `segment`.
    pub fn permits(&self, segment: &Segment) -> bool {
        match self.classification.blocked_from() {
            Some(limit) => segment.sensitivity() < limit,
            None => true,
        }
    }

    /// Filter a batch of segments, preserving order.
    pub fn enforce(&self, segments: Vec<Segment>) -> Enforcement {
        let mut outcome = Enforcement {
            forwarded: Vec::with_capacity(segments.len()),
            ..Enforcement::default()
        };

        for segment in segments {
            if self.permits(&segment) {
                outcome.forwarded.push(segment);
            } else {
                tracing::info!(
                    node = %self.classification,
                    seq_num = segment.seq_num(),
                    sensitivity = segment.sensitivity(),
                    "segment blocked by governance policy"
                );
                outcome.dropped += 1;
            }
        }

        tracing::info!(
            node = %self.classification,
            forwarded = outcome.forwarded.len(),
            dropped = outcome.dropped,
            "node processing complete"
        );
        outcome
    }

    /// Filter raw wire buffers. A buffer that does not decode is rejected
    /// and counted in `malformed`; its siblings are unaffected.
    pub fn enforce_frames(&self, frames: Vec<Bytes>) -> Enforcement {
        let mut malformed = 0;
        let segments: Vec<Segment> = frames
            .into_iter()
            .filter_map(|frame| match Segment::decode(frame) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    tracing::warn!(node = %self.classification, error = %e, "malformed segment rejected");
                    malformed += 1;
                    None
                }
            })
            .collect();

        let mut outcome = self.enforce(segments);
        outcome.malformed = malformed;
        outcome
    }
}

/// Filter `segments` through a single node.
pub fn enforce(segments: Vec<Segment>, classification: NodeClassification) -> Enforcement {
    GovernanceFilter::new(classification).enforce(segments)
}

/// Result of passing a batch along a path of nodes.
#[derive(Debug, Clone, Default)]
pub struct RouteOutcome {
    pub forwarded: Vec<Segment>,
    /// Drops at each hop, in path order.
    pub dropped_per_hop: Vec<usize>,
}

impl RouteOutcome {
    pub fn total_dropped(&self) -> usize {
        self.dropped_per_hop.iter().sum()
    }
}

/// Pass `segments` through every hop in order.
pub fn enforce_route(segments: Vec<Segment>, hops: &[NodeClassification]) -> RouteOutcome {
    let mut forwarded = segments;
    let mut dropped_per_hop = Vec::with_capacity(hops.len());
    for hop in hops {
        let outcome = enforce(forwarded, *hop);
        dropped_per_hop.push(outcome.dropped);
        forwarded = outcome.forwarded;
    }
    RouteOutcome {
        forwarded,
        dropped_per_hop,
    }
}
