use bytes::Bytes;

use doip_core::policy::NodeClassification::External;
use doip_core::wire::{self, WireError};
use doip_services::{reassemble, GovernanceFilter, Segment, Segmenter};

use crate::*;

/// Segments written back to back decode as a stream.
#[test]
fn test_concatenated_stream_decodes() {
    let data = source(10_000, 11);
    let segments = Segmenter::new(3000, 7).unwrap().split(&data).unwrap();
    let stream: Vec<u8> = segments.iter().flat_map(|s| s.as_bytes().to_vec()).collect();

    let decoded = wire::decode_segment_stream(&stream).unwrap();
    assert_eq!(decoded.len(), 4);
    let joined: Vec<u8> = decoded.iter().flat_map(|(_, p)| p.to_vec()).collect();
    assert_eq!(joined, data.to_vec());

    let truncated = &stream[..stream.len() - 1];
    assert!(matches!(
        wire::decode_segment_stream(truncated),
        Err(WireError::PayloadTruncated { .. })
    ));
}

/// A node receiving raw frames rejects garbage without losing good frames.
#[test]
fn test_node_tolerates_malformed_frames() {
    let data = source(4 * SEGMENT_SIZE, 12);
    let mut frames: Vec<Bytes> = Segmenter::default()
        .split(&data)
        .unwrap()
        .into_iter()
        .map(Segment::into_bytes)
        .collect();
    frames.insert(2, Bytes::from_static(b"XX not a segment at all"));
    let mut bad_magic = frames[3].to_vec();
    bad_magic[0] = b'Z';
    frames.push(Bytes::from(bad_magic));

    let outcome = GovernanceFilter::new(External).enforce_frames(frames);
    assert_eq!(outcome.malformed, 2);
    assert_eq!(outcome.dropped, 2);
    assert_eq!(outcome.forwarded.len(), 2);

    let result = reassemble(&outcome.forwarded).unwrap();
    assert_eq!(result.missing, vec![0, 1]);
    assert_eq!(&result.data[..], &data[2 * SEGMENT_SIZE..]);
}

/// Wire bytes received from elsewhere decode to the same segment.
#[test]
fn test_segment_survives_transport() {
    let segments = Segmenter::new(1000, 3).unwrap().split(&source(2500, 13)).unwrap();
    for s in &segments {
        let copy = Bytes::copy_from_slice(s.as_bytes());
        let decoded = Segment::decode(copy).unwrap();
        assert_eq!(&decoded, s);
        assert!(decoded.verify());
    }
    assert_eq!(segments[2].payload().len(), 500);
}
