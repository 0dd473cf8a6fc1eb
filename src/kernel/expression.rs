//! `pnnx.Expression`: evaluates a compiled postfix statement over the
//! flattened batch of input tensor handles using a stack of
//! per-batch-length vectors.

use crate::expr::{self, PostfixNode};
use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{Kernel, Status};

pub struct Expression {
    postfix: Vec<PostfixNode>,
}

impl Expression {
    pub fn new(statement: &str) -> Self {
        Self { postfix: expr::compile(statement) }
    }
}

impl Kernel for Expression {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if inputs.is_empty() || outputs.is_empty() {
            return Status::FailedInputEmpty;
        }
        let n = outputs.len();
        if inputs.len() % n != 0 || inputs.len() == n {
            return Status::FailedBatchMismatch;
        }

        let mut stack: Vec<Vec<TensorHandle>> = Vec::new();
        for node in &self.postfix {
            match node {
                PostfixNode::Input(k) => {
                    let start = k * n;
                    assert!(start + n <= inputs.len(), "expression input index out of range");
                    stack.push(inputs[start..start + n].to_vec());
                }
                PostfixNode::Add | PostfixNode::Mul => {
                    let rhs = stack.pop().expect("expression stack underflow");
                    let lhs = stack.pop().expect("expression stack underflow");
                    let combined: Vec<TensorHandle> = lhs
                        .iter()
                        .zip(rhs.iter())
                        .map(|(a, b)| {
                            let a = a.read().unwrap();
                            let b = b.read().unwrap();
                            let result = match node {
                                PostfixNode::Add => Tensor::elem_add(&a, &b),
                                PostfixNode::Mul => Tensor::elem_mul(&a, &b),
                                PostfixNode::Input(_) => unreachable!(),
                            };
                            crate::operand::handle(result)
                        })
                        .collect();
                    stack.push(combined);
                }
            }
        }

        assert_eq!(stack.len(), 1, "expression evaluation must leave exactly one value");
        let result = stack.pop().unwrap();
        for (out, computed) in outputs.iter().zip(result.into_iter()) {
            *out.write().unwrap() = computed.read().unwrap().clone();
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "pnnx.Expression"
    }
}
