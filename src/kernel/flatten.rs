//! `torch.flatten(start_dim, end_dim)`: collapses a contiguous run of axes
//! of the conceptual `(N, C, H, W)` tensor. The batch axis is handled by
//! the executor, so this kernel only ever sees the `(C, H, W)` axes and
//! works with 0-based bounds in `{0, 1, 2}` after subtracting the PNNX
//! convention's 1-based, batch-inclusive indexing.

use crate::operand::TensorHandle;

use super::{check_batches, Kernel, Status};

pub struct Flatten {
    start_dim: i64,
    end_dim: i64,
}

impl Flatten {
    /// `start_dim`/`end_dim` as declared in the model (1-based, batch
    /// counted as axis 0, negative indices count from the end over the
    /// 4 conceptual axes).
    pub fn new(start_dim: i64, end_dim: i64) -> Self {
        let total_dims = 4i64;
        let norm = |d: i64| if d < 0 { d + total_dims } else { d };
        let start = norm(start_dim) - 1;
        let end = norm(end_dim) - 1;
        assert!((0..=2).contains(&start) && (0..=2).contains(&end), "flatten dims out of range");
        assert!(end > start, "flatten requires end_dim > start_dim");
        Self { start_dim: start, end_dim: end }
    }
}

impl Kernel for Flatten {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if let Some(status) = check_batches(inputs, outputs) {
            return status;
        }
        if inputs.len() != outputs.len() {
            return Status::FailedBatchMismatch;
        }
        for (input, output) in inputs.iter().zip(outputs.iter()) {
            let src = input.read().unwrap();
            let (c, h, w) = (src.channels(), src.rows(), src.cols());
            let new_shape: Vec<usize> = match (self.start_dim, self.end_dim) {
                (0, 2) => vec![c * h * w],
                (1, 2) => vec![c, h * w],
                (0, 1) => vec![c * h, w],
                other => unreachable!("validated range produced {other:?}"),
            };
            let reshaped = src.reshape(&new_shape, true);
            drop(src);
            *output.write().unwrap() = reshaped;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "torch.flatten"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::handle;
    use crate::tensor::Tensor;

    #[test]
    fn flattens_channel_and_plane() {
        let mut t = Tensor::new(2, 2, 2);
        t.fill_values(&(0..8).map(|x| x as f32).collect::<Vec<_>>(), true);
        let kernel = Flatten::new(1, 3);
        let input = vec![handle(t)];
        let output = vec![handle(Tensor::new(1, 1, 1))];
        assert_eq!(kernel.forward(&input, &output), Status::Success);
        assert_eq!(output[0].read().unwrap().raw_shape(), &[8]);
    }

    #[test]
    #[should_panic(expected = "end_dim > start_dim")]
    fn equal_bounds_are_rejected() {
        Flatten::new(1, 1);
    }
}
