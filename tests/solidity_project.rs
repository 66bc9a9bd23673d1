use ferret::config::{Config, ProjectConfiguration};
use ferret::core::baseline::BaselineStore;
use ferret::core::catalog::BASELINE;
use ferret::core::engine::AnalysisEngine;
use ferret::core::finding_collector::FindingCollector;
use ferret::frontend::{discover_project, SolidityProvider};
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const WALLET: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

contract Wallet {
    address owner;

    function withdraw() public {
        require(tx.origin == owner);
    }
}
"#;

const WALLET_TEST: &str = r#"pragma solidity ^0.8.20;

contract WalletTest {
    function testOrigin() public view {
        assert(tx.origin != address(0));
    }
}
"#;

fn foundry_project(root: &Path) {
    write(root.join("foundry.toml"), "[profile.default]\nsrc = \"src\"\n").expect("write");
    create_dir_all(root.join("src")).expect("mkdir");
    create_dir_all(root.join("test")).expect("mkdir");
    write(root.join("src/Wallet.sol"), WALLET).expect("write");
    write(root.join("test/Wallet.t.sol"), WALLET_TEST).expect("write");
}

fn analyze(root: &Path, baseline: Option<BaselineStore>) -> (FindingCollector, AnalysisEngine) {
    let project = discover_project(&[root.join("src"), root.join("test")], &[]).expect("project");
    let paths: Vec<PathBuf> = project.artifacts.iter().map(|a| a.path.clone()).collect();
    let provider = SolidityProvider::load(&paths);

    let mut engine = AnalysisEngine::with_builtin_detectors();
    if let Some(store) = baseline {
        engine = engine.with_baseline(store);
    }
    let configuration = ProjectConfiguration::new(&Config::default());
    let mut collector = FindingCollector::new();
    engine
        .analyze(&[project], &provider, &configuration, &mut collector)
        .expect("analysis runs");
    (collector, engine)
}

#[test]
fn test_sources_are_analyzed_and_tests_are_not() {
    let dir = tempdir().expect("tempdir");
    foundry_project(dir.path());

    let (collector, _) = analyze(dir.path(), None);
    let reported: Vec<(&str, &str, usize)> = collector
        .incidents()
        .iter()
        .map(|i| (i.issue_id.as_str(), i.location.file.as_str(), i.location.line))
        .collect();
    assert_eq!(reported, vec![("TxOriginUsage", "src/Wallet.sol", 8)]);
}

#[test]
fn test_written_baseline_hides_findings_on_the_next_run() {
    let dir = tempdir().expect("tempdir");
    foundry_project(dir.path());
    let baseline_path = dir.path().join("ferret-baseline.json");

    let (first, _) = analyze(
        dir.path(),
        Some(BaselineStore::load(&baseline_path).write_on_close(false)),
    );
    assert_eq!(first.count_for("TxOriginUsage"), 1);
    assert!(baseline_path.exists());

    let (second, engine) = analyze(dir.path(), Some(BaselineStore::load(&baseline_path)));
    assert_eq!(second.count_for("TxOriginUsage"), 0);
    assert_eq!(second.count_for(BASELINE), 1);
    let summary = engine.baseline().expect("baseline").summary();
    assert_eq!(summary.found_warnings, 1);
    assert_eq!(summary.fixed, 0);
}
