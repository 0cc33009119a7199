use std::path::Path;

use ixa_crossborder::{
    Context, ContextGlobalPropertiesExt, ContextMobilityExt, ContextNetworkExt, ContextRandomExt,
    ContextScenarioExt, Edge, LayerKey, Parameters, TravelEvent,
};

const SCENARIO: &str = "tests/data/scenario_small.json";

fn run_scenario(seed: u64) -> (Vec<TravelEvent>, Vec<(LayerKey, Vec<Edge>)>) {
    let mut context = Context::new();
    context.init_random(seed);
    context
        .load_global_property(Parameters, Path::new(SCENARIO))
        .unwrap();
    context.setup_scenario().unwrap();
    context.run_scenario().unwrap();
    let layers = context
        .get_layer_keys()
        .into_iter()
        .map(|key| {
            let edges = context.get_layer(&key).unwrap().edges().to_vec();
            (key, edges)
        })
        .collect();
    (context.get_travel_ledger().to_vec(), layers)
}

#[test]
fn same_seed_same_run() {
    let first = run_scenario(99);
    assert!(!first.0.is_empty());
    assert_eq!(first, run_scenario(99));
}

#[test]
fn multilayer_scenario_has_purpose_layers() {
    let (_, layers) = run_scenario(1);
    let keys: Vec<&LayerKey> = layers.iter().map(|(key, _)| key).collect();
    for key in [LayerKey::Home, LayerKey::School, LayerKey::Work, LayerKey::CrossCommunity] {
        assert!(keys.contains(&&key), "missing layer {key}");
    }
}

#[test]
fn cli_prints_a_report() {
    let output = assert_cmd::Command::cargo_bin("crossborder")
        .unwrap()
        .args(["--config", SCENARIO, "--random-seed", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["day"], 5.0);
    let census = report["census"].as_array().unwrap();
    assert!(census.iter().any(|layer| layer["layer"] == "cross_community"));
    assert!(report["travel"]["departures"].as_u64().unwrap() > 0);
}

#[test]
fn cli_requires_a_config() {
    assert_cmd::Command::cargo_bin("crossborder")
        .unwrap()
        .assert()
        .failure();
}

#[test]
fn cli_rejects_an_invalid_log_level() {
    assert_cmd::Command::cargo_bin("crossborder")
        .unwrap()
        .args(["--config", SCENARIO, "--log-level", "loud"])
        .assert()
        .failure();
}
