//! `torch.cat(dim)` restricted to the channel axis (`dim == 1 || dim ==
//! -3`). The input batch is a multiple of the output batch; each output
//! index concatenates the corresponding strided slice of inputs.

use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{Kernel, Status};

pub struct Cat {
    dim: i64,
}

impl Cat {
    pub fn new(dim: i64) -> Self {
        assert!(dim == 1 || dim == -3, "cat only supports the channel axis (dim=1 or dim=-3)");
        Self { dim }
    }
}

impl Kernel for Cat {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if inputs.is_empty() || outputs.is_empty() {
            return Status::FailedInputEmpty;
        }
        let out_batch = outputs.len();
        if inputs.len() % out_batch != 0 || inputs.len() == out_batch {
            return Status::FailedBatchMismatch;
        }
        let packet_sz = inputs.len() / out_batch;

        for b in 0..out_batch {
            let parts: Vec<_> = (0..packet_sz).map(|k| inputs[b + k * out_batch].read().unwrap()).collect();
            let (rows, cols) = (parts[0].rows(), parts[0].cols());
            for p in &parts {
                assert_eq!((p.rows(), p.cols()), (rows, cols), "cat requires matching H/W across inputs");
            }
            let total_channels: usize = parts.iter().map(|p| p.channels()).sum();
            let mut out = Tensor::new(total_channels, rows, cols);
            let mut c_off = 0;
            for p in &parts {
                for c in 0..p.channels() {
                    out.slice_mut(c_off + c).copy_from_slice(p.slice(c));
                }
                c_off += p.channels();
            }
            *outputs[b].write().unwrap() = out;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "torch.cat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::handle;
    use rand::Rng;

    #[test]
    fn concatenates_four_into_two_along_channel() {
        let mut rng = rand::thread_rng();
        let make = |v: f32| {
            let mut t = Tensor::new(6, 32, 32);
            t.fill(v);
            let _ = rng.gen::<f32>();
            t
        };
        let inputs: Vec<TensorHandle> = vec![
            handle(make(1.0)),
            handle(make(2.0)),
            handle(make(3.0)),
            handle(make(4.0)),
        ];
        let outputs: Vec<TensorHandle> = vec![handle(Tensor::new(1, 1, 1)), handle(Tensor::new(1, 1, 1))];
        let status = Cat::new(1).forward(&inputs, &outputs);
        assert_eq!(status, Status::Success);

        let out0 = outputs[0].read().unwrap();
        assert_eq!((out0.channels(), out0.rows(), out0.cols()), (12, 32, 32));
        assert_eq!(out0.at(0, 0, 0), 1.0);
        assert_eq!(out0.at(11, 0, 0), 3.0);

        let out1 = outputs[1].read().unwrap();
        assert_eq!(out1.at(0, 0, 0), 2.0);
        assert_eq!(out1.at(11, 0, 0), 4.0);
    }
}
