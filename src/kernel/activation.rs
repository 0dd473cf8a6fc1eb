//! Pointwise activations: `ReLU`, `Sigmoid`, `HardSigmoid`, `HardSwish`.
//! All four share the same batch/shape contract, so the forward loop is
//! factored into one helper parameterized by the pointwise function.

use crate::operand::TensorHandle;

use super::{check_batches, Kernel, Status};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

fn forward_pointwise(
    inputs: &[TensorHandle],
    outputs: &[TensorHandle],
    f: impl Fn(f32) -> f32 + Sync,
) -> Status {
    if let Some(status) = check_batches(inputs, outputs) {
        return status;
    }
    if inputs.len() != outputs.len() {
        return Status::FailedBatchMismatch;
    }

    let apply = |(input, output): (&TensorHandle, &TensorHandle)| {
        let src = input.read().unwrap();
        let mut dst = output.write().unwrap();
        assert_eq!(src.size(), dst.size(), "activation output shape must match input");
        for (o, &i) in dst.data_mut().iter_mut().zip(src.data().iter()) {
            *o = f(i);
        }
    };

    #[cfg(feature = "rayon")]
    inputs.par_iter().zip(outputs.par_iter()).for_each(apply);
    #[cfg(not(feature = "rayon"))]
    inputs.iter().zip(outputs.iter()).for_each(apply);

    Status::Success
}

pub struct Relu;

impl Kernel for Relu {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        forward_pointwise(inputs, outputs, |x| if x > 0.0 { x } else { 0.0 })
    }

    fn kernel_name(&self) -> &str {
        "nn.ReLU"
    }
}

pub struct Sigmoid;

impl Kernel for Sigmoid {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        forward_pointwise(inputs, outputs, |x| 1.0 / (1.0 + (-x).exp()))
    }

    fn kernel_name(&self) -> &str {
        "nn.Sigmoid"
    }
}

pub struct HardSigmoid;

impl Kernel for HardSigmoid {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        forward_pointwise(inputs, outputs, |x| {
            if x <= -3.0 {
                0.0
            } else if x >= 3.0 {
                1.0
            } else {
                x / 6.0 + 0.5
            }
        })
    }

    fn kernel_name(&self) -> &str {
        "nn.Hardsigmoid"
    }
}

pub struct HardSwish;

impl Kernel for HardSwish {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        forward_pointwise(inputs, outputs, |x| {
            if x <= -3.0 {
                0.0
            } else if x >= 3.0 {
                x
            } else {
                x * (x + 3.0) / 6.0
            }
        })
    }

    fn kernel_name(&self) -> &str {
        "nn.Hardswish"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::handle;
    use crate::tensor::Tensor;

    fn single(t: Tensor) -> Vec<TensorHandle> {
        vec![handle(t)]
    }

    #[test]
    fn relu_is_idempotent() {
        let mut t = Tensor::new(1, 2, 2);
        t.fill_values(&[-1.0, 2.0, -3.0, 4.0], true);
        let input = single(t.clone());
        let once = single(Tensor::new(1, 2, 2));
        Relu.forward(&input, &once);

        let twice = single(Tensor::new(1, 2, 2));
        Relu.forward(&once, &twice);

        assert_eq!(once[0].read().unwrap().values(true), twice[0].read().unwrap().values(true));
        assert_eq!(once[0].read().unwrap().values(true), vec![0.0, 2.0, 0.0, 4.0]);
    }

    #[test]
    fn hard_sigmoid_is_monotonic_in_range() {
        let mut t = Tensor::new(1, 1, 5);
        t.fill_values(&[-4.0, -3.0, 0.0, 3.0, 4.0], true);
        let input = single(t);
        let output = single(Tensor::new(1, 1, 5));
        HardSigmoid.forward(&input, &output);
        let vs = output[0].read().unwrap().values(true);
        assert_eq!(vs, vec![0.0, 0.0, 0.5, 1.0, 1.0]);
        for w in vs.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn empty_batch_is_recoverable() {
        let status = Relu.forward(&[], &[]);
        assert_eq!(status, Status::FailedInputEmpty);
    }
}
