//! DOIP wire format: the two on-wire headers and their codecs.
//!
//! These types ARE the protocol. Every field and every size is part of the
//! wire format. Both headers are big-endian (network order) and use
//! zerocopy derives over `#[repr(C)]` byte-aligned fields, so encoding is a
//! plain byte view and decoding never allocates. There is no unsafe code in
//! this module.
//!
//! Admission header (16 bytes):
//!   [version:4][type:4][flags:8][sequence:32][timestamp:32][policy_id:32][checksum:16]
//!
//! Segment header (56 bytes, followed by `payload_length` payload bytes):
//!   ["D2":2][segment_id:32][seq_num:32][total_segments:32][sensitivity:8]
//!   [op_hint:8][policy_id:32][payload_length:32][checksum:256]

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::digest;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Admission header size in bytes.
pub const ADMISSION_HEADER_LEN: usize = 16;

/// Segment header size in bytes, not including the payload.
pub const SEGMENT_HEADER_LEN: usize = 56;

/// Leading bytes of every segment.
pub const SEGMENT_MAGIC: [u8; 2] = *b"D2";

/// The only admission header version the gate forwards.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Default segment payload size.
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1024;

/// Chunks starting below this byte offset are tagged `LegalProhibited`.
pub const SENSITIVE_PREFIX_BYTES: u64 = 128 * 1024;

// ── Admission Header ──────────────────────────────────────────────────────────

/// Compact per-packet header validated by the admission gate.
///
/// The first byte packs the protocol version (high nibble) and the packet
/// type (low nibble). `flags` is carried but not interpreted. `checksum` is
/// carried for the sender's use; the gate does not validate it.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct AdmissionHeader {
    /// High nibble: version. Low nibble: packet type.
    pub version_type: u8,
    pub flags: u8,
    pub sequence: U32<BigEndian>,
    /// Sender clock, seconds. Not checked against the local clock.
    pub timestamp: U32<BigEndian>,
    pub policy_id: U32<BigEndian>,
    pub checksum: U16<BigEndian>,
}

assert_eq_size!(AdmissionHeader, [u8; ADMISSION_HEADER_LEN]);

impl AdmissionHeader {
    /// Build a header. `version` and `packet_type` must each fit in 4 bits.
    pub fn new(
        version: u8,
        packet_type: u8,
        sequence: u32,
        timestamp: u32,
        policy_id: u32,
    ) -> Result<Self, WireError> {
        if version > 0x0F {
            return Err(WireError::NibbleOverflow {
                field: "version",
                value: version,
            });
        }
        if packet_type > 0x0F {
            return Err(WireError::NibbleOverflow {
                field: "type",
                value: packet_type,
            });
        }
        Ok(Self {
            version_type: (version << 4) | packet_type,
            flags: 0,
            sequence: U32::new(sequence),
            timestamp: U32::new(timestamp),
            policy_id: U32::new(policy_id),
            checksum: U16::new(0),
        })
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = U16::new(checksum);
        self
    }

    pub fn version(&self) -> u8 {
        self.version_type >> 4
    }

    pub fn packet_type(&self) -> u8 {
        self.version_type & 0x0F
    }

    /// Decode a header. The input must be exactly 16 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != ADMISSION_HEADER_LEN {
            return Err(WireError::AdmissionLength(bytes.len()));
        }
        Self::read_from(bytes).ok_or(WireError::AdmissionLength(bytes.len()))
    }

    pub fn encode(&self) -> [u8; ADMISSION_HEADER_LEN] {
        let mut out = [0u8; ADMISSION_HEADER_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

// ── Segment Header ────────────────────────────────────────────────────────────

/// Header preceding every segment payload.
///
/// A receiver can route, filter, and verify a segment from this header
/// alone. `checksum` is the SHA-256 digest of the payload and is checked by
/// the reassembler before any payload byte is used.
///
/// Wire size: 56 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct SegmentHeader {
    /// Always `SEGMENT_MAGIC`. Anything else is not a segment.
    pub magic: [u8; 2],

    /// Shared by every segment of one transfer.
    pub segment_id: U32<BigEndian>,

    /// Zero-based position of this segment in the transfer.
    pub seq_num: U32<BigEndian>,

    /// Number of segments the transfer was split into.
    pub total_segments: U32<BigEndian>,

    /// Raw `SensitivityLevel` byte. Unknown values are preserved.
    pub sensitivity: u8,

    /// Raw `OperationHint` byte. Advisory, never validated.
    pub op_hint: u8,

    /// Governance rule this segment was produced under.
    pub policy_id: U32<BigEndian>,

    /// Number of payload bytes following this header.
    pub payload_length: U32<BigEndian>,

    /// SHA-256 of the payload bytes.
    pub checksum: [u8; 32],
}

assert_eq_size!(SegmentHeader, [u8; SEGMENT_HEADER_LEN]);

/// Identity and governance fields of a segment, everything but the
/// payload-derived length and checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFields {
    pub segment_id: u32,
    pub seq_num: u32,
    pub total_segments: u32,
    pub sensitivity: u8,
    pub op_hint: u8,
    pub policy_id: u32,
}

impl SegmentHeader {
    /// Build the header for `payload`, computing its length and checksum.
    pub fn for_payload(fields: SegmentFields, payload: &[u8]) -> Result<Self, WireError> {
        Self::with_checksum(fields, payload.len(), digest::checksum(payload))
    }

    /// Build a header from a precomputed checksum.
    pub fn with_checksum(
        fields: SegmentFields,
        payload_len: usize,
        checksum: [u8; 32],
    ) -> Result<Self, WireError> {
        let payload_length =
            u32::try_from(payload_len).map_err(|_| WireError::PayloadTooLarge(payload_len))?;
        Ok(Self {
            magic: SEGMENT_MAGIC,
            segment_id: U32::new(fields.segment_id),
            seq_num: U32::new(fields.seq_num),
            total_segments: U32::new(fields.total_segments),
            sensitivity: fields.sensitivity,
            op_hint: fields.op_hint,
            policy_id: U32::new(fields.policy_id),
            payload_length: U32::new(payload_length),
            checksum,
        })
    }

    pub fn fields(&self) -> SegmentFields {
        SegmentFields {
            segment_id: self.segment_id.get(),
            seq_num: self.seq_num.get(),
            total_segments: self.total_segments.get(),
            sensitivity: self.sensitivity,
            op_hint: self.op_hint,
            policy_id: self.policy_id.get(),
        }
    }

    /// Total encoded size: header plus declared payload.
    pub fn frame_len(&self) -> usize {
        SEGMENT_HEADER_LEN + self.payload_length.get() as usize
    }

    /// True if `payload` hashes to the stored checksum.
    pub fn verify(&self, payload: &[u8]) -> bool {
        digest::checksum(payload) == self.checksum
    }
}

/// Encode one segment: header followed by payload.
pub fn encode_segment(fields: SegmentFields, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    let header = SegmentHeader::for_payload(fields, payload)?;
    let mut frame = Vec::with_capacity(SEGMENT_HEADER_LEN + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the segment at the front of `buf`.
///
/// The payload is sliced by the declared `payload_length`. Returns the
/// header, the payload, and whatever follows the payload.
pub fn decode_segment_prefix(buf: &[u8]) -> Result<(SegmentHeader, &[u8], &[u8]), WireError> {
    if buf.len() < SEGMENT_HEADER_LEN {
        return Err(WireError::Truncated(buf.len()));
    }
    let header = SegmentHeader::read_from_prefix(buf).ok_or(WireError::Truncated(buf.len()))?;
    if header.magic != SEGMENT_MAGIC {
        return Err(WireError::BadMagic(header.magic));
    }
    let declared = header.payload_length.get() as usize;
    let available = buf.len() - SEGMENT_HEADER_LEN;
    if available < declared {
        return Err(WireError::PayloadTruncated {
            declared,
            available,
        });
    }
    let body = &buf[SEGMENT_HEADER_LEN..];
    let (payload, rest) = body.split_at(declared);
    Ok((header, payload, rest))
}

/// Decode a buffer holding exactly one segment.
pub fn decode_segment(buf: &[u8]) -> Result<(SegmentHeader, &[u8]), WireError> {
    let (header, payload, rest) = decode_segment_prefix(buf)?;
    if !rest.is_empty() {
        return Err(WireError::TrailingBytes(rest.len()));
    }
    Ok((header, payload))
}

/// Walk a buffer of back-to-back segments, framing each by its declared
/// payload length.
pub fn decode_segment_stream(mut buf: &[u8]) -> Result<Vec<(SegmentHeader, &[u8])>, WireError> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (header, payload, rest) = decode_segment_prefix(buf)?;
        out.push((header, payload));
        buf = rest;
    }
    Ok(out)
}

// ── Sensitivity & Operation Hint ──────────────────────────────────────────────

/// Classification controlling whether a segment may cross a boundary.
///
/// Anything above `Restricted` is export-controlled and must never leave a
/// trusted boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SensitivityLevel {
    Public = 0x00,
    Restricted = 0x01,
    LegalProhibited = 0x02,
}

impl TryFrom<u8> for SensitivityLevel {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(SensitivityLevel::Public),
            0x01 => Ok(SensitivityLevel::Restricted),
            0x02 => Ok(SensitivityLevel::LegalProhibited),
            other => Err(WireError::UnknownSensitivity(other)),
        }
    }
}

impl From<SensitivityLevel> for u8 {
    fn from(s: SensitivityLevel) -> u8 {
        s as u8
    }
}

/// What the receiver is expected to do with a segment. Advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationHint {
    Store = 0x00,
    Compute = 0x01,
    /// Inspect before merging into the reassembled content.
    Inspect = 0x02,
}

impl TryFrom<u8> for OperationHint {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(OperationHint::Store),
            0x01 => Ok(OperationHint::Compute),
            0x02 => Ok(OperationHint::Inspect),
            other => Err(WireError::UnknownOperationHint(other)),
        }
    }
}

impl From<OperationHint> for u8 {
    fn from(h: OperationHint) -> u8 {
        h as u8
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("admission header must be exactly {} bytes, got {0}", ADMISSION_HEADER_LEN)]
    AdmissionLength(usize),

    #[error("{field} value {value} does not fit in 4 bits")]
    NibbleOverflow { field: &'static str, value: u8 },

    #[error("buffer of {0} bytes is shorter than the {} byte segment header", SEGMENT_HEADER_LEN)]
    Truncated(usize),

    #[error("invalid magic bytes: {0:02x?}")]
    BadMagic([u8; 2]),

    #[error("declared payload of {declared} bytes but only {available} available")]
    PayloadTruncated { declared: usize, available: usize },

    #[error("{0} trailing bytes after segment payload")]
    TrailingBytes(usize),

    #[error("payload length {0} does not fit in a u32")]
    PayloadTooLarge(usize),

    #[error("unknown sensitivity byte: 0x{0:02x}")]
    UnknownSensitivity(u8),

    #[error("unknown operation hint byte: 0x{0:02x}")]
    UnknownOperationHint(u8),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
