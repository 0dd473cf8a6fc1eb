//! `nn.Conv2d`: grouped 2-D convolution via im2col + GEMM.
//!
//! The im2col sliding order (`for w: for r:`) is load-bearing for the
//! column index of the packed matrix — it must match exactly so the
//! packed matrix, and therefore the GEMM result, is deterministic and
//! reproducible against a naive reference implementation.

use ndarray::Array2;

use crate::operand::TensorHandle;
use crate::tensor::Tensor;

use super::{check_batches, Kernel, Status};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub struct Convolution {
    out_channels: usize,
    in_channels: usize,
    k_h: usize,
    k_w: usize,
    pad_h: usize,
    pad_w: usize,
    s_h: usize,
    s_w: usize,
    groups: usize,
    /// One row-major `(in_channels/groups * k_h * k_w)`-length vector per
    /// output channel.
    kernels: Vec<Vec<f32>>,
    bias: Option<Vec<f32>>,
}

impl Convolution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        out_channels: usize,
        in_channels: usize,
        k_h: usize,
        k_w: usize,
        pad_h: usize,
        pad_w: usize,
        s_h: usize,
        s_w: usize,
        groups: usize,
        weight: Vec<f32>,
        bias: Option<Vec<f32>>,
    ) -> Self {
        assert_eq!(out_channels % groups, 0, "out_channels must be divisible by groups");
        let group_in = in_channels / groups;
        let per_kernel = group_in * k_h * k_w;
        assert_eq!(weight.len(), out_channels * per_kernel, "conv weight size mismatch");
        let kernels = weight.chunks_exact(per_kernel).map(|c| c.to_vec()).collect();
        if let Some(b) = &bias {
            assert_eq!(b.len(), out_channels, "conv bias size mismatch");
        }
        Self {
            out_channels,
            in_channels,
            k_h,
            k_w,
            pad_h,
            pad_w,
            s_h,
            s_w,
            groups,
            kernels,
            bias,
        }
    }

    fn forward_one(&self, input: &Tensor) -> Tensor {
        let padded = if self.pad_h == 0 && self.pad_w == 0 {
            input.clone()
        } else {
            input.pad(self.pad_h, self.pad_h, self.pad_w, self.pad_w, 0.0)
        };
        assert_eq!(padded.channels(), self.in_channels, "conv input channel count mismatch");

        let out_h = (padded.rows() - self.k_h) / self.s_h + 1;
        let out_w = (padded.cols() - self.k_w) / self.s_w + 1;
        assert!(out_h > 0 && out_w > 0, "conv output dims must be positive");

        let group_in = self.in_channels / self.groups;
        let group_out = self.out_channels / self.groups;
        let col_len = out_h * out_w;
        let row_len = group_in * self.k_h * self.k_w;

        let mut out = Tensor::new(self.out_channels, out_h, out_w);

        for g in 0..self.groups {
            let channel_base = g * group_in;
            // im2col: one column per sliding window, outer loop over the
            // starting column then the starting row.
            let mut col_mat = vec![0.0f32; row_len * col_len];
            let mut col_idx = 0;
            for ow in 0..out_w {
                let w0 = ow * self.s_w;
                for oh in 0..out_h {
                    let h0 = oh * self.s_h;
                    let mut row_idx = 0;
                    for lc in 0..group_in {
                        let plane = padded.slice(channel_base + lc);
                        for kw in 0..self.k_w {
                            let base = (w0 + kw) * padded.rows() + h0;
                            // block copy the whole kernel-height window at once
                            for kh in 0..self.k_h {
                                col_mat[(row_idx + kh) * col_len + col_idx] = plane[base + kh];
                            }
                            row_idx += self.k_h;
                        }
                    }
                    col_idx += 1;
                }
            }
            let col_mat = Array2::from_shape_vec((row_len, col_len), col_mat)
                .expect("im2col buffer matches row_len * col_len");

            let group_kernels = &self.kernels[g * group_out..(g + 1) * group_out];
            let compute_channel = |k: usize| -> Vec<f32> {
                let kernel_row = Array2::from_shape_vec((1, row_len), group_kernels[k].clone())
                    .expect("kernel row matches row_len");
                let result = kernel_row.dot(&col_mat);
                let bias = self.bias.as_ref().map(|b| b[g * group_out + k]).unwrap_or(0.0);
                result.iter().map(|v| v + bias).collect()
            };

            #[cfg(feature = "rayon")]
            let channel_rows: Vec<Vec<f32>> = (0..group_out).into_par_iter().map(compute_channel).collect();
            #[cfg(not(feature = "rayon"))]
            let channel_rows: Vec<Vec<f32>> = (0..group_out).map(compute_channel).collect();

            for (k, row_major_plane) in channel_rows.into_iter().enumerate() {
                let oc = g * group_out + k;
                // row_major_plane is row-major over (out_h, out_w); the
                // tensor's own channel buffer is column-major.
                for ow in 0..out_w {
                    for oh in 0..out_h {
                        *out.at_mut(oc, oh, ow) = row_major_plane[oh * out_w + ow];
                    }
                }
            }
        }
        out
    }
}

impl Kernel for Convolution {
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
        "nn.Conv2d"
    }
}
