//! Admission gate: real-time, per-packet forward/drop decisions.
//!
//! Each packet is judged on its 16-byte header alone: protocol version,
//! then an O(1) policy table lookup. Decisions are stateless, so a stream
//! of packets can be judged concurrently with no ordering between them.
//! A drop is a normal outcome, never an error.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Serialize, Serializer};
use tokio::sync::{broadcast, mpsc, Semaphore};

use doip_core::policy::{PolicyId, PolicyTable, SecurityLevel};
use doip_core::wire::{AdmissionHeader, ADMISSION_HEADER_LEN, PROTOCOL_VERSION};

/// Why a packet was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TooShort,
    InvalidVersion(u8),
    PolicyRejected(PolicyId),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::TooShort => f.write_str("Packet too short"),
            DropReason::InvalidVersion(v) => write!(f, "Invalid Protocol Version: {v}"),
            DropReason::PolicyRejected(id) => write!(f, "Policy ID 0x{id:02x} rejected by MsBV"),
        }
    }
}

impl Serialize for DropReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Gate verdict for one packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Decision {
    #[serde(rename = "forwarded")]
    Forward {
        policy_id: PolicyId,
        level: SecurityLevel,
        #[serde(serialize_with = "unix_seconds")]
        observed_at: SystemTime,
    },
    #[serde(rename = "dropped")]
    Drop { reason: DropReason },
}

impl Decision {
    pub fn is_forward(&self) -> bool {
        matches!(self, Decision::Forward { .. })
    }
}

fn unix_seconds<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    serializer.serialize_f64(secs)
}

/// Validates packet headers against a shared policy table.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    policy: Arc<PolicyTable>,
}

impl AdmissionGate {
    pub fn new(policy: Arc<PolicyTable>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Judge one packet. Only the first 16 bytes are read.
    pub fn admit(&self, packet: &[u8]) -> Decision {
        let decision = self.decide(packet);
        if let Decision::Drop { reason } = &decision {
            tracing::debug!(%reason, len = packet.len(), "packet dropped");
        }
        decision
    }

    fn decide(&self, packet: &[u8]) -> Decision {
        if packet.len() < ADMISSION_HEADER_LEN {
            return Decision::Drop {
                reason: DropReason::TooShort,
            };
        }

        let header = match AdmissionHeader::decode(&packet[..ADMISSION_HEADER_LEN]) {
            Ok(h) => h,
            Err(_) => {
                return Decision::Drop {
                    reason: DropReason::TooShort,
                }
            }
        };

        if header.version() != PROTOCOL_VERSION {
            return Decision::Drop {
                reason: DropReason::InvalidVersion(header.version()),
            };
        }

        let policy_id = header.policy_id.get();
        match self.policy.authorize(policy_id) {
            Some(level) => Decision::Forward {
                policy_id,
                level,
                observed_at: SystemTime::now(),
            },
            None => Decision::Drop {
                reason: DropReason::PolicyRejected(policy_id),
            },
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(Arc::new(PolicyTable::default()))
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Largest permit count both `Semaphore::new` and `acquire_many` accept.
const MAX_IN_FLIGHT_LIMIT: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// A packet tagged by the caller so decisions can be matched back to it.
pub type TaggedPacket = (u64, Bytes);

/// Admission worker: dequeues packets, judges each on its own task, and
/// emits `(tag, Decision)` pairs in completion order.
pub struct AdmissionWorker {
    gate: AdmissionGate,
    packet_rx: mpsc::Receiver<TaggedPacket>,
    decision_tx: mpsc::Sender<(u64, Decision)>,
    shutdown: broadcast::Receiver<()>,
    max_in_flight: usize,
}

impl AdmissionWorker {
    pub fn new(
        gate: AdmissionGate,
        packet_rx: mpsc::Receiver<TaggedPacket>,
        decision_tx: mpsc::Sender<(u64, Decision)>,
        shutdown: broadcast::Receiver<()>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            gate,
            packet_rx,
            decision_tx,
            shutdown,
            max_in_flight: max_in_flight.clamp(1, MAX_IN_FLIGHT_LIMIT),
        }
    }

    pub async fn run(mut self) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("admission worker shutting down");
                    break;
                }

                msg = self.packet_rx.recv() => {
                    let (tag, packet) = match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("packet_tx dropped, admission worker exiting");
                            break;
                        }
                    };

                    let permit = match permits.clone().acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => break,
                    };
                    let gate = self.gate.clone();
                    let decision_tx = self.decision_tx.clone();
                    tokio::spawn(async move {
                        let decision = gate.admit(&packet);
                        if decision_tx.send((tag, decision)).await.is_err() {
                            tracing::debug!(tag, "decision receiver dropped");
                        }
                        drop(permit);
                    });
                }
            }
        }

        // Let in-flight decisions finish before the sender is dropped.
        let _ = permits.acquire_many(self.max_in_flight as u32).await;
    }
}
