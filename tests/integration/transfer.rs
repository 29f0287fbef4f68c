use bytes::Bytes;

use doip_core::config::IntegrityPolicy;
use doip_core::policy::NodeClassification::{External, Internal};
use doip_core::wire::{SensitivityLevel, SEGMENT_HEADER_LEN};
use doip_services::{
    enforce, enforce_route, reassemble, run_transfer, Reassembler, ReassemblyError, Segmenter,
};

use crate::*;

/// 1 MiB at 64 KiB: 16 segments, the first two export-controlled.
#[test]
fn test_one_mib_segments_and_tags() {
    let data = source(MIB, 1);
    let segments = Segmenter::new(SEGMENT_SIZE, 0xCAFE_BABE)
        .unwrap()
        .split(&data)
        .unwrap();

    assert_eq!(segments.len(), 16);
    let id = segments[0].segment_id();
    for (i, s) in segments.iter().enumerate() {
        assert_eq!(s.seq_num(), i as u32);
        assert_eq!(s.total_segments(), 16);
        assert_eq!(s.segment_id(), id);
        assert_eq!(s.policy_id(), 0xCAFE_BABE);
        assert!(s.verify());
    }

    let prohibited: Vec<u32> = segments
        .iter()
        .filter(|s| s.sensitivity() == SensitivityLevel::LegalProhibited as u8)
        .map(|s| s.seq_num())
        .collect();
    assert_eq!(prohibited, vec![0, 1]);
}

/// External node drops the two prohibited segments and forwards 14.
#[test]
fn test_external_node_filters_prefix() {
    let segments = Segmenter::default().split(&source(MIB, 2)).unwrap();
    let outcome = enforce(segments, External);
    assert_eq!(outcome.dropped, 2);
    assert_eq!(outcome.forwarded.len(), 14);
    assert!(outcome.forwarded.iter().all(|s| s.seq_num() >= 2));
}

/// Reassembling the filtered stream is incomplete: 16 expected, 14 got.
#[test]
fn test_filtered_reassembly_is_incomplete() {
    let data = source(MIB, 3);
    let segments = Segmenter::default().split(&data).unwrap();
    let outcome = enforce(segments, External);

    let result = reassemble(&outcome.forwarded).unwrap();
    let warning = result.warning.expect("incomplete transfer must warn");
    assert_eq!((warning.expected, warning.got), (16, 14));
    assert_eq!(result.missing, vec![0, 1]);
    assert_eq!(result.data.len(), 917_504);
    assert_eq!(&result.data[..], &data[2 * SEGMENT_SIZE..]);
    assert_ne!(&result.data[..], &data[..]);
}

#[test]
fn test_internal_path_is_byte_identical() {
    let data = source(MIB + 777, 4);
    let segments = Segmenter::default().split(&data).unwrap();
    let outcome = enforce(segments, Internal);
    assert_eq!(outcome.dropped, 0);

    let result = reassemble(&outcome.forwarded).unwrap();
    assert!(result.is_complete());
    assert_eq!(result.expected, 17);
    assert_eq!(result.data, data);
}

#[test]
fn test_multi_hop_drops_once() {
    let segments = Segmenter::default().split(&source(MIB, 5)).unwrap();
    let route = enforce_route(segments, &[Internal, External, External, Internal]);
    assert_eq!(route.dropped_per_hop, vec![0, 2, 0, 0]);
    assert_eq!(route.forwarded.len(), 14);
}

#[test]
fn test_corrupt_segment_fails_fast() {
    let segments = Segmenter::default().split(&source(4 * SEGMENT_SIZE, 6)).unwrap();
    let mut frames: Vec<Vec<u8>> = segments.iter().map(|s| s.as_bytes().to_vec()).collect();
    frames[3][SEGMENT_HEADER_LEN + 100] ^= 0xFF;

    assert_eq!(
        reassemble(&frames).unwrap_err(),
        ReassemblyError::Integrity { seq_num: 3 }
    );

    let lenient = Reassembler::new(IntegrityPolicy::SkipCorrupt)
        .reassemble(&frames)
        .unwrap();
    assert_eq!(lenient.corrupt, vec![3]);
    assert_eq!(lenient.data.len(), 3 * SEGMENT_SIZE);
}

#[test]
fn test_shuffled_arrival_reassembles() {
    let data = source(10 * SEGMENT_SIZE / 3, 7);
    let mut segments = Segmenter::new(4096, 1).unwrap().split(&data).unwrap();
    segments.reverse();
    let mid = segments.len() / 2;
    segments.rotate_left(mid);

    let result = reassemble(&segments).unwrap();
    assert!(result.is_complete());
    assert_eq!(result.data, data);
}

#[tokio::test]
async fn test_pipeline_external_route_report() {
    let data = source(MIB, 8);
    let outcome = run_transfer(&config_with_hops(&[External]), data).await.unwrap();
    let report = &outcome.report;

    assert_eq!(report.segments_created, 16);
    assert_eq!(report.dropped_per_hop, vec![2]);
    assert_eq!(report.forwarded, 14);
    assert_eq!((report.expected, report.received), (16, 14));
    assert_eq!(report.output_bytes, 917_504);
    assert!(!report.matched);

    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["hops"], serde_json::json!(["external"]));
    assert_eq!(json["warning"], "missing segments: expected 16, got 14");
}

#[tokio::test]
async fn test_pipeline_internal_route_matches() {
    let data = source(3 * MIB / 2, 9);
    let outcome = run_transfer(&config_with_hops(&[Internal, Internal]), data.clone())
        .await
        .unwrap();
    assert!(outcome.report.matched);
    assert_eq!(outcome.report.segments_created, 24);
    assert_eq!(outcome.output, data);
}

#[tokio::test]
async fn test_concurrent_split_matches_sequential() {
    let data = source(MIB, 10);
    let segmenter = Segmenter::default();
    let sequential = segmenter.split_with_id(&data, 0xABCD).unwrap();
    let concurrent = segmenter
        .split_concurrent(Bytes::clone(&data), 0xABCD, 8)
        .await
        .unwrap();
    assert_eq!(sequential, concurrent);
}
