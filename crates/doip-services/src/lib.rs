//! doip-services: segmentation, governance filtering, reassembly, and the
//! admission gate.

pub mod admission;
pub mod governance;
pub mod pipeline;
pub mod reassembly;
pub mod segment;
pub mod segmenter;

pub use admission::{AdmissionGate, AdmissionWorker, Decision, DropReason};
pub use governance::{enforce, enforce_route, Enforcement, GovernanceFilter, RouteOutcome};
pub use pipeline::{run_transfer, TransferError, TransferOutcome, TransferReport};
pub use reassembly::{reassemble, IncompleteWarning, Reassembled, Reassembler, ReassemblyError};
pub use segment::Segment;
pub use segmenter::{SegmentError, Segmenter, TaggingRule};
