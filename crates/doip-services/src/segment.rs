//! Segment: the atomic unit of a DOIP transfer.

use bytes::{Bytes, BytesMut};
use zerocopy::AsBytes;

use doip_core::wire::{self, SegmentFields, SegmentHeader, WireError, SEGMENT_HEADER_LEN};

/// An encoded segment: a decoded header plus the full wire frame it came
/// from. Immutable once built; filters and the reassembler only select and
/// reorder segments, they never rewrite one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    header: SegmentHeader,
    frame: Bytes,
}

impl Segment {
    /// Encode a segment, computing the payload checksum.
    pub fn encode(fields: SegmentFields, payload: &[u8]) -> Result<Self, WireError> {
        let header = SegmentHeader::for_payload(fields, payload)?;
        Ok(Self::from_parts(header, payload))
    }

    /// Frame an already-built header with its payload.
    pub(crate) fn from_parts(header: SegmentHeader, payload: &[u8]) -> Self {
        let mut frame = BytesMut::with_capacity(SEGMENT_HEADER_LEN + payload.len());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(payload);
        Self {
            header,
            frame: frame.freeze(),
        }
    }

    /// Decode a buffer holding exactly one segment. The checksum is not
    /// verified here.
    pub fn decode(frame: Bytes) -> Result<Self, WireError> {
        let (header, _) = wire::decode_segment(&frame)?;
        Ok(Self { header, frame })
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    pub fn segment_id(&self) -> u32 {
        self.header.segment_id.get()
    }

    pub fn seq_num(&self) -> u32 {
        self.header.seq_num.get()
    }

    pub fn total_segments(&self) -> u32 {
        self.header.total_segments.get()
    }

    /// Raw sensitivity byte.
    pub fn sensitivity(&self) -> u8 {
        self.header.sensitivity
    }

    /// Raw operation hint byte.
    pub fn op_hint(&self) -> u8 {
        self.header.op_hint
    }

    pub fn policy_id(&self) -> u32 {
        self.header.policy_id.get()
    }

    /// Payload bytes. Shares the frame's allocation.
    pub fn payload(&self) -> Bytes {
        self.frame.slice(SEGMENT_HEADER_LEN..)
    }

    /// True if the payload still matches the header checksum.
    pub fn verify(&self) -> bool {
        self.header.verify(&self.frame[SEGMENT_HEADER_LEN..])
    }

    /// The full wire frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn into_bytes(self) -> Bytes {
        self.frame
    }
}

impl AsRef<[u8]> for Segment {
    fn as_ref(&self) -> &[u8] {
        &self.frame
    }
}
