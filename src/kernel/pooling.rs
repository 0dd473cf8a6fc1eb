//! `nn.MaxPool2d` and `nn.AdaptiveAvgPool2d`.

use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{check_batches, Kernel, Status};

pub struct MaxPool2d {
    pad_h: usize,
    pad_w: usize,
    k_h: usize,
    k_w: usize,
    s_h: usize,
    s_w: usize,
}

impl MaxPool2d {
    pub fn new(pad_h: usize, pad_w: usize, k_h: usize, k_w: usize, s_h: usize, s_w: usize) -> Self {
        Self { pad_h, pad_w, k_h, k_w, s_h, s_w }
    }

    fn pool_one(&self, input: &Tensor) -> Tensor {
        let padded = if self.pad_h == 0 && self.pad_w == 0 {
            input.clone()
        } else {
            input.pad(self.pad_h, self.pad_h, self.pad_w, self.pad_w, f32::MIN)
        };
        let out_h = (padded.rows() - self.k_h) / self.s_h + 1;
        let out_w = (padded.cols() - self.k_w) / self.s_w + 1;
        assert!(out_h > 0 && out_w > 0, "max pool output dims must be positive");

        let mut out = Tensor::new(padded.channels(), out_h, out_w);
        for c in 0..padded.channels() {
            for ow in 0..out_w {
                let w0 = ow * self.s_w;
                for oh in 0..out_h {
                    let h0 = oh * self.s_h;
                    let mut m = f32::MIN;
                    for kw in 0..self.k_w {
                        for kh in 0..self.k_h {
                            m = m.max(padded.at(c, h0 + kh, w0 + kw));
                        }
                    }
                    *out.at_mut(c, oh, ow) = m;
                }
            }
        }
        out
    }
}

impl Kernel for MaxPool2d {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if let Some(status) = check_batches(inputs, outputs) {
            return status;
        }
        if inputs.len() != outputs.len() {
            return Status::FailedBatchMismatch;
        }
        for (input, output) in inputs.iter().zip(outputs.iter()) {
            let pooled = self.pool_one(&input.read().unwrap());
            *output.write().unwrap() = pooled;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "nn.MaxPool2d"
    }
}

pub struct AdaptiveAvgPool2d {
    out_h: usize,
    out_w: usize,
}

impl AdaptiveAvgPool2d {
    pub fn new(out_h: usize, out_w: usize) -> Self {
        Self { out_h, out_w }
    }

    fn pool_one(&self, input: &Tensor) -> Tensor {
        let (in_h, in_w) = (input.rows(), input.cols());
        let stride_h = in_h / self.out_h;
        let stride_w = in_w / self.out_w;
        let kernel_h = in_h - (self.out_h - 1) * stride_h;
        let kernel_w = in_w - (self.out_w - 1) * stride_w;

        let mut out = Tensor::new(input.channels(), self.out_h, self.out_w);
        let window_sz = (kernel_h * kernel_w) as f32;
        for c in 0..input.channels() {
            for ow in 0..self.out_w {
                let w0 = ow * stride_w;
                for oh in 0..self.out_h {
                    let h0 = oh * stride_h;
                    let mut sum = 0.0f32;
                    for kw in 0..kernel_w {
                        for kh in 0..kernel_h {
                            sum += input.at(c, h0 + kh, w0 + kw);
                        }
                    }
                    *out.at_mut(c, oh, ow) = sum / window_sz;
                }
            }
        }
        out
    }
}

impl Kernel for AdaptiveAvgPool2d {
    fn forward(&self, inputs: &[TensorHandle], outputs: &[TensorHandle]) -> Status {
        if let Some(status) = check_batches(inputs, outputs) {
            return status;
        }
        if inputs.len() != outputs.len() {
            return Status::FailedBatchMismatch;
        }
        for (input, output) in inputs.iter().zip(outputs.iter()) {
            let pooled = self.pool_one(&input.read().unwrap());
            let declared = output.read().unwrap();
            let shape_ok = pooled.channels() == declared.channels()
                && pooled.rows() == declared.rows()
                && pooled.cols() == declared.cols();
            drop(declared);
            assert!(shape_ok, "adaptive pool output shape does not match declared operand shape");
            *output.write().unwrap() = pooled;
        }
        Status::Success
    }

    fn kernel_name(&self) -> &str {
        "nn.AdaptiveAvgPool2d"
    }
}
