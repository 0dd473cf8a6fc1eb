//! Softmax along an arbitrary axis of the tensor's raw shape.

use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{check_batches, Kernel, Status};

pub struct Softmax {
    pub dim: i64,
}

impl Softmax {
    pub fn new(dim: i64) -> Self {
        Self { dim }
    }

    fn softmax_one(&self, input: &Tensor) -> Tensor {
        let mut raw = input.raw_shape().to_vec();
        while raw.len() < 3 {
            raw.push(1);
        }
        let rank = raw.len() as i64;
        let axis = if self.dim < 0 { self.dim + rank } else { self.dim };
        assert!(axis >= 0 && axis < rank, "softmax dim out of range");
        let axis = axis as usize;

        let outer_sz: usize = raw[..axis].iter().product();
        let axis_sz = raw[axis];
        let inner_sz: usize = raw[axis + 1..].iter().product();

        let data = input.values(true);
        let mut out = vec![0.0f32; data.len()];

        for outer in 0..outer_sz {
            for inner in 0..inner_sz {
                let pos = |a: usize| (outer * axis_sz + a) * inner_sz + inner;
                let max = (0..axis_sz).map(|a| data[pos(a)]).fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0f32;
                for a in 0..axis_sz {
                    let e = (data[pos(a)] - max).exp();
                    out[pos(a)] = e;
                    sum += e;
                }
                for a in 0..axis_sz {
                    out[pos(a)] /= sum;
                }
            }
        }

        let mut result = input.clone();
        result.fill_values(&out, true);
        result
    }
}

impl Kernel for Softmax {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if let Some(status) = check_batches(inputs, outputs) {
            return status;
        }
        if inputs.len() != outputs.len() {
            return Status::FailedBatchMismatch;
        }
        for (input, output) in inputs.iter().zip(outputs.iter()) {
            let computed = self.softmax_one(&input.read().unwrap());
            *output.write().unwrap() = computed;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "nn.Softmax"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::handle;

    #[test]
    fn rows_sum_to_one_along_selected_axis() {
        let mut t = Tensor::new(2, 3, 4);
        let vs: Vec<f32> = (0..24).map(|x| x as f32).collect();
        t.fill_values(&vs, true);

        let kernel = Softmax::new(1);
        let input = vec![handle(t)];
        let output = vec![handle(Tensor::new(2, 3, 4))];
        assert_eq!(kernel.forward(&input, &output), Status::Success);

        let out = output[0].read().unwrap();
        let raw = out.raw_shape();
        let (c, h, w) = (raw[0], raw[1], raw[2]);
        let rowmajor = out.values(true);
        for ci in 0..c {
            for wi in 0..w {
                let mut sum = 0.0;
                for hi in 0..h {
                    sum += rowmajor[(ci * h + hi) * w + wi];
                }
                assert!((sum - 1.0).abs() < 1e-5, "sum was {sum}");
            }
        }
    }

    #[test]
    fn negative_dim_wraps() {
        let mut t = Tensor::new(1, 1, 4);
        t.fill_values(&[1.0, 2.0, 3.0, 4.0], true);
        let forward_pos = Softmax::new(0).softmax_one(&t);
        let forward_neg = Softmax::new(-3).softmax_one(&t);
        assert!(forward_pos.is_same(&forward_neg));
    }
}
