//! doip-core: shared types, wire format, digests, and policy table.
//! All other DOIP crates depend on this one.

pub mod config;
pub mod digest;
pub mod policy;
pub mod wire;

pub use config::{DoipConfig, IntegrityPolicy};
pub use policy::{NodeClassification, PolicyId, PolicyTable, SecurityLevel};
pub use wire::{
    AdmissionHeader, OperationHint, SegmentFields, SegmentHeader, SensitivityLevel, WireError,
};
