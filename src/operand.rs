//! Named typed edges in the computation graph: each operand carries a
//! fixed-length batch of shared tensor handles.

use std::sync::{Arc, RwLock};

use crate::tensor::Tensor;

/// Shared tensor handle. Producer output operands and consumer input
/// operands hold clones of the same handle; propagation rebinds the `Arc`,
/// it never copies tensor contents. `Arc<RwLock<_>>` rather than
/// `Rc<RefCell<_>>`: kernels parallelize their own batch loop with
/// `rayon`, which requires the items it iterates over to be `Send`.
pub type TensorHandle = Arc<RwLock<Tensor>>;

pub fn handle(t: Tensor) -> TensorHandle {
    Arc::new(RwLock::new(t))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    Unknown,
    Float32,
}

#[derive(Debug, Clone)]
pub struct Operand {
    pub name: String,
    /// Declared shape including the leading batch dimension.
    pub shape: Vec<i64>,
    pub elem_type: ElemType,
    pub batch: Vec<TensorHandle>,
}

impl Operand {
    pub fn new(name: impl Into<String>, shape: Vec<i64>, elem_type: ElemType) -> Self {
        Self {
            name: name.into(),
            shape,
            elem_type,
            batch: Vec::new(),
        }
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }
}
