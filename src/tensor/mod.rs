//! Column-major, per-channel 3-D float tensor: the unit of data that flows
//! along every operand in the graph.
//!
//! Physical storage is always `(channels, rows, cols)`; the "raw shape" is
//! the logical rank a caller sees after the collapsing rule below. Both are
//! kept in sync by every shape-mutating operation.

mod ops;

use ndarray::ShapeBuilder;
use rand_distr::StandardNormal;

/// Logical shape a tensor reports to callers: 1, 2 or 3 dimensions.
///
/// Collapsing rule applied whenever a physical `(C, H, W)` triple is turned
/// into a raw shape: `(1,1,W) -> [W]`, `(1,H,W) -> [H,W]`, else `[C,H,W]`.
pub type RawShape = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    channels: usize,
    rows: usize,
    cols: usize,
    /// Flat column-major buffer: element (c, r, col) lives at
    /// `c * rows * cols + col * rows + r`.
    data: Vec<f32>,
    raw_shape: RawShape,
}

fn collapse_raw_shape(channels: usize, rows: usize, cols: usize) -> RawShape {
    if channels == 1 && rows == 1 {
        vec![cols]
    } else if channels == 1 {
        vec![rows, cols]
    } else {
        vec![channels, rows, cols]
    }
}

impl Tensor {
    pub fn new(channels: usize, rows: usize, cols: usize) -> Self {
        assert!(channels > 0 && rows > 0 && cols > 0, "tensor dims must be positive");
        Self {
            channels,
            rows,
            cols,
            data: vec![0.0; channels * rows * cols],
            raw_shape: collapse_raw_shape(channels, rows, cols),
        }
    }

    /// Builds a tensor from a 1-, 2- or 3-element raw shape.
    pub fn from_shape(shape: &[usize]) -> Self {
        let (c, h, w) = match shape.len() {
            1 => (1, 1, shape[0]),
            2 => (1, shape[0], shape[1]),
            3 => (shape[0], shape[1], shape[2]),
            n => panic!("raw shape must have rank 1..=3, got {n}"),
        };
        Self::new(c, h, w)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn size(&self) -> usize {
        self.channels * self.rows * self.cols
    }

    pub fn raw_shape(&self) -> &[usize] {
        &self.raw_shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        channel * self.rows * self.cols + col * self.rows + row
    }

    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        self.data[self.offset(channel, row, col)]
    }

    pub fn at_mut(&mut self, channel: usize, row: usize, col: usize) -> &mut f32 {
        let off = self.offset(channel, row, col);
        &mut self.data[off]
    }

    /// Linear access into the physical buffer.
    pub fn index(&self, offset: usize) -> f32 {
        self.data[offset]
    }

    /// Contiguous column-major slice holding one channel's `rows x cols`
    /// matrix.
    pub fn slice(&self, channel: usize) -> &[f32] {
        let plane = self.rows * self.cols;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    pub fn slice_mut(&mut self, channel: usize) -> &mut [f32] {
        let plane = self.rows * self.cols;
        &mut self.data[channel * plane..(channel + 1) * plane]
    }

    /// Borrows one channel as a column-major `ndarray` matrix view, for
    /// kernels that hand the plane straight to a GEMM.
    pub fn channel_view(&self, channel: usize) -> ndarray::ArrayView2<'_, f32> {
        let shape = (self.rows, self.cols).f();
        ndarray::ArrayView2::from_shape(shape, self.slice(channel))
            .expect("channel plane has rows*cols elements")
    }

    pub fn channel_view_mut(&mut self, channel: usize) -> ndarray::ArrayViewMut2<'_, f32> {
        let shape = (self.rows, self.cols).f();
        ndarray::ArrayViewMut2::from_shape(shape, self.slice_mut(channel))
            .expect("channel plane has rows*cols elements")
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn ones(&mut self) {
        self.fill(1.0);
    }

    pub fn rand(&mut self) {
        let mut rng = rand::thread_rng();
        for v in self.data.iter_mut() {
            *v = rand::distributions::Distribution::<f32>::sample(&StandardNormal, &mut rng);
        }
    }

    /// Fills from a caller-supplied value list. If `row_major`, `values` is
    /// interpreted in `(c, r, col)` row-major order and transposed per
    /// channel before being written into the column-major buffer.
    pub fn fill_values(&mut self, values: &[f32], row_major: bool) {
        assert_eq!(values.len(), self.size(), "value count must match tensor size");
        if !row_major {
            self.data.copy_from_slice(values);
            return;
        }
        let (rows, cols) = (self.rows, self.cols);
        for c in 0..self.channels {
            let base = c * rows * cols;
            for r in 0..rows {
                for col in 0..cols {
                    let src = base + r * cols + col;
                    let dst = self.offset(c, r, col);
                    self.data[dst] = values[src];
                }
            }
        }
    }

    /// Inverse of `fill_values`: reads the buffer out in the requested
    /// order.
    pub fn values(&self, row_major: bool) -> Vec<f32> {
        if !row_major {
            return self.data.clone();
        }
        let mut out = vec![0.0f32; self.size()];
        let (rows, cols) = (self.rows, self.cols);
        for c in 0..self.channels {
            let base = c * rows * cols;
            for r in 0..rows {
                for col in 0..cols {
                    out[base + r * cols + col] = self.at(c, r, col);
                }
            }
        }
        out
    }

    /// Grows rows/cols by the given margins, filling new cells with
    /// `pad_value`. Channel count is preserved.
    pub fn pad(&self, up: usize, down: usize, left: usize, right: usize, pad_value: f32) -> Tensor {
        let new_rows = self.rows + up + down;
        let new_cols = self.cols + left + right;
        let mut out = Tensor::new(self.channels, new_rows, new_cols);
        out.fill(pad_value);
        for c in 0..self.channels {
            for col in 0..self.cols {
                for r in 0..self.rows {
                    *out.at_mut(c, r + up, col + left) = self.at(c, r, col);
                }
            }
        }
        out
    }

    /// Reshapes to a new 1/2/3-D raw shape. `row_major=false` reinterprets
    /// the existing column-major buffer over the new rectangle; this is a
    /// pure reinterpretation, valid because the element count matches.
    /// `row_major=true` permutes data so that row-major iteration over the
    /// new shape matches row-major iteration over the old shape.
    pub fn reshape(&self, new_shape: &[usize], row_major: bool) -> Tensor {
        let new_size: usize = new_shape.iter().product();
        assert_eq!(new_size, self.size(), "reshape must preserve element count");
        if !row_major {
            let mut out = Tensor::from_shape(new_shape);
            out.data.copy_from_slice(&self.data);
            out
        } else {
            let values = self.values(true);
            let mut out = Tensor::from_shape(new_shape);
            out.fill_values(&values, true);
            out
        }
    }

    pub fn flatten(&self, row_major: bool) -> Tensor {
        self.reshape(&[self.size()], row_major)
    }

    /// Approximate equality with absolute tolerance `1e-5`.
    pub fn is_same(&self, other: &Tensor) -> bool {
        if self.channels != other.channels || self.rows != other.rows || self.cols != other.cols {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| (a - b).abs() <= 1e-5)
    }

    pub fn transform<F: Fn(f32) -> f32>(&self, f: F) -> Tensor {
        let mut out = self.clone();
        out.data.iter_mut().for_each(|v| *v = f(*v));
        out
    }
}
