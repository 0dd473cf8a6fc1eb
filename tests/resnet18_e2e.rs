//! Full end-to-end inference against a real ResNet-18 export.
//!
//! Requires a multi-megabyte `resnet18_batch1.param`/`.bin` fixture pair
//! plus a CSV reference output, none of which are checked into this repo.
//! Ignored until that fixture is provided; the harness itself (graph
//! wiring, BFS scheduling, per-operator dispatch) is exercised without it
//! by the scenarios in `kernel_scenarios.rs` and the graph-property tests
//! in `nnrt::graph::executor`.

use nnrt::{EngineConfig, Tensor};

#[test]
#[ignore = "needs resnet18_batch1.param/.bin + a CSV reference; not checked into this repo"]
fn resnet18_batch1_channel0_matches_reference() {
    let mut graph = nnrt::Graph::new("fixtures/resnet18_batch1.param", "fixtures/resnet18_batch1.bin");
    graph.build("input", "output").unwrap();

    let mut input = Tensor::new(3, 224, 224);
    input.fill(2.0);

    let output = graph.forward(vec![input], EngineConfig::default());

    let reference = std::fs::read_to_string("fixtures/resnet18_batch1_channel0.csv").unwrap();
    let expected: Vec<f32> = reference.split(',').map(|s| s.trim().parse().unwrap()).collect();

    let got = output[0].slice(0);
    for (a, b) in got.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 5e-6);
    }
}
