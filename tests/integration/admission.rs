use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};

use doip_core::policy::{PolicyTable, SecurityLevel};
use doip_services::{AdmissionGate, AdmissionWorker, Decision, DropReason};

use crate::*;

#[test]
fn test_known_policy_forwarded() {
    let gate = AdmissionGate::default();
    match gate.admit(&packet(0x01, b"hello")) {
        Decision::Forward {
            policy_id, level, ..
        } => {
            assert_eq!(policy_id, 0x01);
            assert_eq!(level, SecurityLevel(0));
        }
        other => panic!("expected forward, got {other:?}"),
    }
}

#[test]
fn test_unknown_policy_dropped() {
    let decision = AdmissionGate::default().admit(&packet(0x99, b""));
    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"status": "dropped", "reason": "Policy ID 0x99 rejected by MsBV"})
    );
}

#[test]
fn test_version_checked_first() {
    let decision = AdmissionGate::default().admit(&versioned_packet(2, 0x01, b""));
    assert_eq!(
        decision,
        Decision::Drop {
            reason: DropReason::InvalidVersion(2)
        }
    );
}

#[test]
fn test_five_byte_packet_too_short() {
    let decision = AdmissionGate::default().admit(&[0x10, 0, 0, 0, 1]);
    assert_eq!(
        decision,
        Decision::Drop {
            reason: DropReason::TooShort
        }
    );
}

#[test]
fn test_every_default_policy_admitted() {
    let gate = AdmissionGate::default();
    for (id, level) in [(1, 0), (2, 1), (3, 2), (4, 3)] {
        match gate.admit(&packet(id, b"")) {
            Decision::Forward { level: got, .. } => assert_eq!(got, SecurityLevel(level)),
            other => panic!("policy {id:#x}: {other:?}"),
        }
    }
}

#[test]
fn test_sparse_table_with_large_ids() {
    let table = PolicyTable::new([(0xDEAD_BEEF, SecurityLevel(7)), (5, SecurityLevel(1))]);
    assert!(!table.is_dense());
    let gate = AdmissionGate::new(Arc::new(table));
    assert!(gate.admit(&packet(0xDEAD_BEEF, b"")).is_forward());
    assert!(gate.admit(&packet(5, b"")).is_forward());
    assert!(!gate.admit(&packet(6, b"")).is_forward());
}

#[tokio::test]
async fn test_worker_stream_decisions() {
    let (packet_tx, packet_rx) = mpsc::channel(8);
    let (decision_tx, mut decision_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = AdmissionWorker::new(AdmissionGate::default(), packet_rx, decision_tx, shutdown_rx, 3);
    let handle = tokio::spawn(worker.run());

    let inputs: Vec<Vec<u8>> = (0..50u32)
        .map(|i| match i % 3 {
            0 => packet(1 + i % 4, &[i as u8; 32]),
            1 => packet(0x1000 + i, b""),
            _ => vec![0u8; (i % 16) as usize],
        })
        .collect();

    let sender = tokio::spawn(async move {
        for (tag, p) in inputs.into_iter().enumerate() {
            packet_tx.send((tag as u64, Bytes::from(p))).await.unwrap();
        }
    });

    let mut decisions = Vec::new();
    while let Some(d) = decision_rx.recv().await {
        decisions.push(d);
    }
    sender.await.unwrap();
    handle.await.unwrap();

    decisions.sort_by_key(|(tag, _)| *tag);
    assert_eq!(decisions.len(), 50);
    for (tag, decision) in decisions {
        match tag % 3 {
            0 => assert!(decision.is_forward(), "packet {tag}"),
            1 => assert!(matches!(
                decision,
                Decision::Drop {
                    reason: DropReason::PolicyRejected(_)
                }
            )),
            _ => assert_eq!(
                decision,
                Decision::Drop {
                    reason: DropReason::TooShort
                }
            ),
        }
    }
}
