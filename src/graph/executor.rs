//! BFS dataflow executor: drains a FIFO queue of ready nodes, invoking
//! each kernel and propagating its output to successors.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::EngineConfig;
use crate::kernel::Status;
use crate::operand::{handle, TensorHandle};
use crate::tensor::Tensor;

use super::Graph;

fn propagate(graph: &Graph, cur: usize, queue: &mut VecDeque<usize>) {
    let producer_batch = graph.nodes[cur].output.borrow().batch.clone();
    for &(succ_idx, input_idx) in &graph.nodes[cur].consumers {
        {
            let mut inputs = graph.nodes[succ_idx].inputs.borrow_mut();
            inputs[input_idx].batch = producer_batch.clone();
        }
        graph.nodes[succ_idx].mark_arrived();
        if graph.nodes[succ_idx].is_ready() {
            queue.push_back(succ_idx);
        }
    }
}

pub(super) fn forward(graph: &mut Graph, inputs: Vec<Tensor>, config: EngineConfig) -> Vec<Tensor> {
    let input_idx = graph.input_idx.expect("build() sets input_idx");
    let output_idx = graph.output_idx.expect("build() sets output_idx");

    let declared_batch = graph.nodes[input_idx].output.borrow().shape[0] as usize;
    assert_eq!(inputs.len(), declared_batch, "input batch size does not match the graph's declared input batch");

    let handles: Vec<TensorHandle> = inputs.into_iter().map(handle).collect();
    graph.nodes[input_idx].output.borrow_mut().batch = handles;

    let mut queue = VecDeque::new();
    queue.push_back(input_idx);
    let mut timings: HashMap<String, Duration> = HashMap::new();
    let mut propagation_time = Duration::ZERO;

    while let Some(cur) = queue.pop_front() {
        if cur == output_idx {
            break;
        }
        if cur != input_idx {
            let (name, type_name, in_handles, out_handles) = {
                let node = &graph.nodes[cur];
                let in_handles: Vec<TensorHandle> =
                    node.inputs.borrow().iter().flat_map(|op| op.batch.clone()).collect();
                let out_handles = node.output.borrow().batch.clone();
                (node.name.clone(), node.type_name.clone(), in_handles, out_handles)
            };

            let start = config.debug.then(Instant::now);
            let status = graph.nodes[cur]
                .kernel
                .as_ref()
                .unwrap_or_else(|| panic!("node {name:?} has no kernel"))
                .forward(&in_handles, &out_handles);
            if let Some(t0) = start {
                *timings.entry(type_name.clone()).or_default() += t0.elapsed();
            }
            assert_eq!(status, Status::Success, "kernel {name:?} ({type_name:?}) returned {status:?}");
        }

        let prop_start = config.debug.then(Instant::now);
        propagate(graph, cur, &mut queue);
        if let Some(t0) = prop_start {
            propagation_time += t0.elapsed();
        }
    }

    for node in &graph.nodes {
        node.reset_ready();
    }

    if config.debug {
        for (ty, d) in &timings {
            debug!(operator = %ty, micros = d.as_micros(), "kernel timing");
        }
        debug!(micros = propagation_time.as_micros(), "operand propagation timing");
    }

    let output_node = &graph.nodes[output_idx];
    let out_batch = output_node.inputs.borrow();
    assert_eq!(out_batch.len(), 1, "output sentinel must have exactly one input operand");
    out_batch[0].batch.iter().map(|h| h.read().unwrap().clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::*;
    use crate::graph::GraphState;

    fn write_temp(contents: &[u8], suffix: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("nnrt_executor_test_{}_{suffix}", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    fn relu_graph() -> (Graph, std::path::PathBuf, std::path::PathBuf) {
        let param_text = "\
pnnx.Input input 0 1 input #input=(1,3,4,4)f32
nn.ReLU relu 1 1 input out #out=(1,3,4,4)f32
pnnx.Output output 1 0 out
";
        let param_path = write_temp(param_text.as_bytes(), "executor_param");
        let bin_path = write_temp(&[], "executor_bin");
        let graph = Graph::new(&param_path, &bin_path);
        (graph, param_path, bin_path)
    }

    #[test]
    fn build_locates_exactly_one_input_and_output_sentinel() {
        let (mut graph, param_path, bin_path) = relu_graph();
        graph.build("input", "output").unwrap();
        assert_eq!(graph.state(), GraphState::Complete);
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.input_idx.is_some());
        assert!(graph.output_idx.is_some());
        assert_ne!(graph.input_idx, graph.output_idx);
        let _ = fs::remove_file(&param_path);
        let _ = fs::remove_file(&bin_path);
    }

    #[test]
    fn forward_resets_every_readiness_counter_and_is_deterministic() {
        let (mut graph, param_path, bin_path) = relu_graph();
        graph.build("input", "output").unwrap();

        let mut t = Tensor::new(3, 4, 4);
        t.fill_values(&(0..48).map(|x| x as f32 - 24.0).collect::<Vec<_>>(), true);

        let first = graph.forward(vec![t.clone()], EngineConfig::default());
        for node in &graph.nodes {
            assert_eq!(node.meet_num.get(), 0);
        }

        let second = graph.forward(vec![t], EngineConfig::default());
        assert_eq!(first[0].values(true), second[0].values(true));
        assert!(first[0].data().iter().all(|&v| v >= 0.0));

        let _ = fs::remove_file(&param_path);
        let _ = fs::remove_file(&bin_path);
    }
}
