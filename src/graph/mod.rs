//! The graph runtime: state machine, builder, and BFS executor.

mod builder;
mod executor;

use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::errors::BuildResult;
use crate::ingest::{ModelSource, ParsedModel, PnnxTextSource};
use crate::node::Node;
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    NeedInit,
    NeedBuild,
    Complete,
}

pub struct Graph {
    param_path: PathBuf,
    bin_path: PathBuf,
    source: Box<dyn ModelSource>,
    state: GraphState,
    nodes: Vec<Node>,
    parsed: Option<ParsedModel>,
    input_name: Option<String>,
    output_name: Option<String>,
    input_idx: Option<usize>,
    output_idx: Option<usize>,
}

impl Graph {
    pub fn new(param_path: impl AsRef<Path>, bin_path: impl AsRef<Path>) -> Self {
        Self::with_source(param_path, bin_path, Box::new(PnnxTextSource))
    }

    pub fn with_source(param_path: impl AsRef<Path>, bin_path: impl AsRef<Path>, source: Box<dyn ModelSource>) -> Self {
        Self {
            param_path: param_path.as_ref().to_path_buf(),
            bin_path: bin_path.as_ref().to_path_buf(),
            source,
            state: GraphState::NeedInit,
            nodes: Vec::new(),
            parsed: None,
            input_name: None,
            output_name: None,
            input_idx: None,
            output_idx: None,
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// `NeedInit -> NeedBuild`: ingest the model and materialize nodes
    /// (without successor wiring or kernel instantiation yet).
    pub fn init(&mut self) -> BuildResult<()> {
        if self.state != GraphState::NeedInit {
            return Ok(());
        }
        builder::init(self)
    }

    /// `NeedBuild -> Complete`: wire successors, instantiate kernels,
    /// allocate tensor slots, discard the parse tree. Invokes `init`
    /// first if needed; a no-op if already `Complete`.
    pub fn build(&mut self, input_name: &str, output_name: &str) -> BuildResult<()> {
        if self.state == GraphState::Complete {
            return Ok(());
        }
        if self.state == GraphState::NeedInit {
            self.init()?;
        }
        self.input_name = Some(input_name.to_string());
        self.output_name = Some(output_name.to_string());
        builder::build(self)
    }

    /// Runs one forward pass. Requires `Complete`. Batch size of `inputs`
    /// must match the declared input operand's batch.
    pub fn forward(&mut self, inputs: Vec<Tensor>, config: EngineConfig) -> Vec<Tensor> {
        assert_eq!(self.state, GraphState::Complete, "forward requires a built graph");
        executor::forward(self, inputs, config)
    }
}
