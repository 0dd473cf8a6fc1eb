//! `nn.Linear`: weight reinterpreted as `out_features x in_features`,
//! applied to each batch element's input viewed as an `in_features x K`
//! column-major matrix.

use ndarray::Array2;

use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{check_batches, Kernel, Status};

pub struct Linear {
    in_features: usize,
    out_features: usize,
    /// Row-major `out_features x in_features`.
    weight: Vec<f32>,
    bias: Option<Vec<f32>>,
}

impl Linear {
    pub fn new(in_features: usize, out_features: usize, weight: Vec<f32>, bias: Option<Vec<f32>>) -> Self {
        assert_eq!(weight.len(), in_features * out_features, "linear weight size mismatch");
        if let Some(b) = &bias {
            assert_eq!(b.len(), out_features, "linear bias size mismatch");
        }
        Self { in_features, out_features, weight, bias }
    }

    fn forward_one(&self, input: &Tensor) -> Tensor {
        let k = input.cols();
        assert_eq!(input.rows(), self.in_features, "linear input rows must equal in_features");

        let w = Array2::from_shape_vec((self.out_features, self.in_features), self.weight.clone())
            .expect("weight shape matches out_features * in_features");
        let x = input.channel_view(0).to_owned();
        let product = w.dot(&x);

        let mut out = Tensor::new(1, self.out_features, k);
        for r in 0..self.out_features {
            let bias = self.bias.as_ref().map(|b| b[r]).unwrap_or(0.0);
            for c in 0..k {
                *out.at_mut(0, r, c) = product[[r, c]] + bias;
            }
        }
        out
    }
}

impl Kernel for Linear {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if let Some(status) = check_batches(inputs, outputs) {
            return status;
        }
        if inputs.len() != outputs.len() {
            return Status::FailedBatchMismatch;
        }
        for (input, output) in inputs.iter().zip(outputs.iter()) {
            let computed = self.forward_one(&input.read().unwrap());
            *output.write().unwrap() = computed;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "nn.Linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::handle;

    #[test]
    fn three_to_four_with_identity_like_rows() {
        let weight = vec![1.0, 2.0, 3.0].repeat(4);
        let kernel = Linear::new(3, 4, weight, None);

        let mut input = Tensor::new(1, 3, 3);
        input.fill_values(&(1..=9).map(|x| x as f32).collect::<Vec<_>>(), true);

        let inputs = vec![handle(input)];
        let outputs = vec![handle(Tensor::new(1, 1, 1))];
        assert_eq!(kernel.forward(&inputs, &outputs), Status::Success);

        let out = outputs[0].read().unwrap();
        for r in 0..4 {
            assert_eq!(
                (0..3).map(|c| out.at(0, r, c)).collect::<Vec<_>>(),
                vec![30.0, 36.0, 42.0]
            );
        }
    }
}
