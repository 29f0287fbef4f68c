use std::sync::Arc;

use doip_core::config::{DoipConfig, IntegrityPolicy};
use doip_core::policy::{NodeClassification, SecurityLevel};
use doip_services::{run_transfer, AdmissionGate};

use crate::*;

const CONFIG: &str = r#"
[segmenter]
segment_size = 32768
policy_id = 7
workers = 2

[node]
hops = ["Internal", "EXTERNAL"]

[reassembly]
integrity = "skip_corrupt"

[[policy.entries]]
id = 0x99
level = 4
"#;

fn write_config() -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("doip-it-{}.toml", std::process::id()));
    std::fs::write(&path, CONFIG).unwrap();
    path
}

#[tokio::test]
async fn test_file_config_drives_pipeline() {
    let path = write_config();
    let config = DoipConfig::load_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    config.validate().unwrap();

    assert_eq!(config.segmenter.segment_size, 32768);
    assert_eq!(
        config.node.hops,
        vec![NodeClassification::Internal, NodeClassification::External]
    );
    assert_eq!(config.reassembly.integrity, IntegrityPolicy::SkipCorrupt);

    // 128 KiB prefix at 32 KiB segments: four are export-controlled.
    let outcome = run_transfer(&config, source(MIB / 2, 20)).await.unwrap();
    assert_eq!(outcome.report.segments_created, 16);
    assert_eq!(outcome.report.dropped_per_hop, vec![0, 4]);
    assert_eq!(outcome.report.missing, vec![0, 1, 2, 3]);

    let gate = AdmissionGate::new(Arc::new(config.policy.table()));
    match gate.admit(&packet(0x99, b"")) {
        doip_services::Decision::Forward { level, .. } => assert_eq!(level, SecurityLevel(4)),
        other => panic!("expected forward, got {other:?}"),
    }
    assert!(!gate.admit(&packet(0x01, b"")).is_forward());
}

#[test]
fn test_env_overrides_file() {
    let mut config = DoipConfig::default();
    config
        .apply_env_overrides(|key| match key {
            "DOIP_NODE__HOPS" => Some("internal,EXTERNAL,internal".into()),
            "DOIP_SEGMENTER__POLICY_ID" => Some("0xCAFEBABE".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.node.hops.len(), 3);
    assert_eq!(config.node.hops[1], NodeClassification::External);
    assert_eq!(config.segmenter.policy_id, 0xCAFE_BABE);
}
