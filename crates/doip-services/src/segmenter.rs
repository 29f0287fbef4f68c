//! Segmenter: splits a byte sequence into tagged, checksummed segments.
//!
//! Governance tagging is a fixed offset rule: a chunk whose first byte sits
//! below the sensitive prefix boundary (128 KiB by default) is tagged
//! LegalProhibited / Inspect, everything after it is Public / Store.

use std::ops::Range;

use bytes::Bytes;
use rand::Rng;

use doip_core::config::SegmenterConfig;
use doip_core::policy::PolicyId;
use doip_core::wire::{
    OperationHint, SegmentFields, SensitivityLevel, WireError, DEFAULT_SEGMENT_SIZE,
    SENSITIVE_PREFIX_BYTES,
};

use crate::segment::Segment;

/// Offset-based sensitivity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggingRule {
    /// Chunks starting below this byte offset are export-controlled.
    pub sensitive_prefix: u64,
}

impl Default for TaggingRule {
    fn default() -> Self {
        Self {
            sensitive_prefix: SENSITIVE_PREFIX_BYTES,
        }
    }
}

impl TaggingRule {
    /// Tags for a chunk starting at `offset`.
    pub fn classify(&self, offset: u64) -> (SensitivityLevel, OperationHint) {
        if offset < self.sensitive_prefix {
            (SensitivityLevel::LegalProhibited, OperationHint::Inspect)
        } else {
            (SensitivityLevel::Public, OperationHint::Store)
        }
    }
}

/// Header fields and source range for one chunk, fixed before any digest
/// work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    pub fields: SegmentFields,
    pub range: Range<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("segment size must be greater than zero")]
    ZeroSegmentSize,

    #[error("{0} segments exceed the u32 sequence space")]
    TooManySegments(u64),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("checksum worker failed: {0}")]
    Worker(String),
}

/// Splits content into one transfer's worth of segments.
#[derive(Debug, Clone)]
pub struct Segmenter {
    segment_size: usize,
    policy_id: PolicyId,
    rule: TaggingRule,
}

impl Segmenter {
    pub fn new(segment_size: usize, policy_id: PolicyId) -> Result<Self, SegmentError> {
        if segment_size == 0 {
            return Err(SegmentError::ZeroSegmentSize);
        }
        Ok(Self {
            segment_size,
            policy_id,
            rule: TaggingRule::default(),
        })
    }

    pub fn from_config(config: &SegmenterConfig) -> Result<Self, SegmentError> {
        Ok(Self::new(config.segment_size, config.policy_id)?.with_rule(TaggingRule {
            sensitive_prefix: config.sensitive_prefix,
        }))
    }

    pub fn with_rule(mut self, rule: TaggingRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    /// Split `data` under a freshly drawn transfer id.
    pub fn split(&self, data: &[u8]) -> Result<Vec<Segment>, SegmentError> {
        self.split_with_id(data, new_segment_id())
    }

    /// Split `data` under the given transfer id.
    pub fn split_with_id(&self, data: &[u8], segment_id: u32) -> Result<Vec<Segment>, SegmentError> {
        let plan = self.plan(data.len(), segment_id)?;
        let segments = plan
            .into_iter()
            .map(|p| Segment::encode(p.fields, &data[p.range]))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            segment_id,
            segments = segments.len(),
            bytes = data.len(),
            "content split into segments"
        );
        Ok(segments)
    }

    /// Assign sequence numbers, ranges, and tags for `len` bytes of input.
    pub fn plan(&self, len: usize, segment_id: u32) -> Result<Vec<PlannedSegment>, SegmentError> {
        let count = len.div_ceil(self.segment_size);
        let total_segments =
            u32::try_from(count).map_err(|_| SegmentError::TooManySegments(count as u64))?;

        Ok((0..total_segments)
            .map(|seq_num| {
                let start = seq_num as usize * self.segment_size;
                let end = (start + self.segment_size).min(len);
                let (sensitivity, op_hint) = self.rule.classify(start as u64);
                PlannedSegment {
                    fields: SegmentFields {
                        segment_id,
                        seq_num,
                        total_segments,
                        sensitivity: sensitivity.into(),
                        op_hint: op_hint.into(),
                        policy_id: self.policy_id,
                    },
                    range: start..end,
                }
            })
            .collect())
    }

    /// Like `split_with_id`, with checksums computed on up to `workers`
    /// blocking threads. Sequence numbers are fixed by the plan before any
    /// worker starts, so the output is identical to the sequential split.
    pub async fn split_concurrent(
        &self,
        data: Bytes,
        segment_id: u32,
        workers: usize,
    ) -> Result<Vec<Segment>, SegmentError> {
        let plan = self.plan(data.len(), segment_id)?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let workers = workers.clamp(1, plan.len());
        let per_worker = plan.len().div_ceil(workers);

        let mut handles = Vec::with_capacity(workers);
        for batch in plan.chunks(per_worker) {
            let batch = batch.to_vec();
            let data = data.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                batch
                    .into_iter()
                    .map(|p| Segment::encode(p.fields, &data[p.range]))
                    .collect::<Result<Vec<_>, WireError>>()
            }));
        }

        let mut segments = Vec::with_capacity(plan.len());
        for handle in handles {
            let batch = handle
                .await
                .map_err(|e| SegmentError::Worker(e.to_string()))??;
            segments.extend(batch);
        }

        tracing::info!(
            segment_id,
            segments = segments.len(),
            bytes = data.len(),
            workers,
            "content split into segments"
        );
        Ok(segments)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            policy_id: 0xCAFE_BABE,
            rule: TaggingRule::default(),
        }
    }
}

/// Random non-zero transfer id.
pub fn new_segment_id() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}
