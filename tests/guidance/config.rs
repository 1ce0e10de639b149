extern crate nyx_pvg as nyx;

use nyx::guidance::{GuidanceConfig, EARTH_GM};
use nyx::io::ConfigRepr;
use std::path::PathBuf;

use crate::init_logger;

#[test]
fn load_sample_config() {
    init_logger();
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "data", "guidance.yaml"]
        .iter()
        .collect();
    let cfg = GuidanceConfig::load(path).unwrap();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg, GuidanceConfig::default());
    assert!((cfg.adapter.mu - EARTH_GM).abs() < 1.0);
    assert_eq!(cfg.adapter.coast_before_final_s, None);
}

#[test]
fn missing_config_file() {
    assert!(GuidanceConfig::load("data/does_not_exist.yaml").is_err());
}
