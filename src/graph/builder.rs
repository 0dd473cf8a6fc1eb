//! `Init` (ingest + node materialization) and `Build` (successor wiring,
//! kernel instantiation, tensor slot allocation).

use std::collections::HashMap;

use tracing::{debug, info};

use crate::attribute::{Attribute, ElemType};
use crate::errors::{BuildError, BuildResult};
use crate::ingest::ParsedOperator;
use crate::node::Node;
use crate::operand::{handle, ElemType as OperandElemType, Operand};
use crate::registry;
use crate::tensor::Tensor;

use super::{Graph, GraphState};

fn convert_elem_type(tag: i32, op_name: &str) -> OperandElemType {
    match tag {
        0 => OperandElemType::Unknown,
        1 => OperandElemType::Float32,
        other => panic!("operator {op_name:?} declares unsupported element type tag {other}"),
    }
}

fn node_from_operator(op: ParsedOperator) -> Node {
    let inputs: Vec<Operand> = op
        .inputs
        .iter()
        .map(|i| Operand::new(i.producer.clone(), i.shape.clone(), convert_elem_type(i.type_tag, &op.name)))
        .collect();

    let output = match op.outputs.first() {
        Some(o) => Operand::new(o.name.clone(), o.shape.clone(), convert_elem_type(o.type_tag, &op.name)),
        None => Operand::new(String::new(), Vec::new(), OperandElemType::Unknown),
    };

    let attrs: HashMap<String, Attribute> = op
        .attrs
        .into_iter()
        .map(|(k, a)| {
            if a.type_tag != 1 {
                panic!("operator {:?} declares unsupported attribute element type tag {}", op.name, a.type_tag);
            }
            (k, Attribute::new(ElemType::Float32, a.shape, a.data))
        })
        .collect();

    let in_degree = inputs.len() as u32;

    Node {
        name: op.name,
        type_name: op.type_name,
        kernel: None,
        meet_num: std::cell::Cell::new(0),
        in_degree,
        inputs: std::cell::RefCell::new(inputs),
        output: std::cell::RefCell::new(output),
        consumers: Vec::new(),
        params: op.params,
        attrs,
    }
}

pub(super) fn init(graph: &mut Graph) -> BuildResult<()> {
    let model = graph.source.load(&graph.param_path, &graph.bin_path)?;
    info!(operator_count = model.operators.len(), "ingested model");

    graph.nodes = model.operators.iter().cloned().map(node_from_operator).collect();
    graph.parsed = Some(model);
    graph.state = GraphState::NeedBuild;
    Ok(())
}

/// Physical shape `(C, H, W)` for a freshly allocated output tensor given
/// its declared shape including the batch axis.
fn physical_dims(declared_shape: &[i64]) -> (usize, usize, usize) {
    let dims: Vec<usize> = declared_shape[1..].iter().map(|&d| d as usize).collect();
    match dims.len() {
        1 => (1, dims[0], 1),
        2 => (1, dims[0], dims[1]),
        3 => (dims[0], dims[1], dims[2]),
        n => panic!("operand rank {} (excluding batch) is not in 2..=4", n + 1),
    }
}

pub(super) fn build(graph: &mut Graph) -> BuildResult<()> {
    // Wire successors: for every node's output operand name, find every
    // other node whose input operand carries that same name.
    let output_names: Vec<String> = graph.nodes.iter().map(|n| n.output.borrow().name.clone()).collect();
    let mut consumers_per_node: Vec<Vec<(usize, usize)>> = vec![Vec::new(); graph.nodes.len()];
    for (consumer_idx, node) in graph.nodes.iter().enumerate() {
        for (input_idx, input_operand) in node.inputs.borrow().iter().enumerate() {
            if input_operand.name.is_empty() {
                continue;
            }
            if let Some(producer_idx) = output_names.iter().position(|n| n == &input_operand.name) {
                consumers_per_node[producer_idx].push((consumer_idx, input_idx));
            }
        }
    }
    for (node, consumers) in graph.nodes.iter_mut().zip(consumers_per_node.into_iter()) {
        node.consumers = consumers;
    }

    // Locate sentinels.
    let input_name = graph.input_name.clone().expect("input_name set by Graph::build");
    let output_name = graph.output_name.clone().expect("output_name set by Graph::build");
    let input_idx = graph
        .nodes
        .iter()
        .position(|n| n.name == input_name)
        .ok_or_else(|| BuildError::MissingSentinel(input_name.clone()))?;
    let output_idx = graph
        .nodes
        .iter()
        .position(|n| n.name == output_name)
        .ok_or_else(|| BuildError::MissingSentinel(output_name.clone()))?;
    graph.input_idx = Some(input_idx);
    graph.output_idx = Some(output_idx);

    // Batch size is declared on the input sentinel's own output operand.
    let batch_n = {
        let shape = &graph.nodes[input_idx].output.borrow().shape;
        assert!(!shape.is_empty(), "input sentinel must declare a shape");
        shape[0] as usize
    };

    // Instantiate kernels and allocate output tensor slots for every
    // non-sentinel node; sentinels get neither.
    for (idx, node) in graph.nodes.iter_mut().enumerate() {
        if idx == input_idx || idx == output_idx {
            continue;
        }
        let creator = registry::lookup(&node.type_name);
        let kernel = creator(&node.params, &mut node.attrs).map_err(|status| BuildError::Parse {
            op_name: node.name.clone(),
            op_type: node.type_name.clone(),
            status,
        })?;
        node.kernel = Some(kernel);

        let declared_shape = node.output.borrow().shape.clone();
        let (c, h, w) = physical_dims(&declared_shape);
        let batch: Vec<_> = (0..batch_n).map(|_| handle(Tensor::new(c, h, w))).collect();
        node.output.borrow_mut().batch = batch;

        debug!(node = %node.name, ty = %node.type_name, "kernel instantiated");
    }

    graph.parsed = None;
    graph.state = GraphState::Complete;
    Ok(())
}
