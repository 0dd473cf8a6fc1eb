//! Element-wise arithmetic and broadcasting.

use super::Tensor;

impl Tensor {
    /// Equal shapes pass through unchanged; otherwise channels must match
    /// and exactly one operand must have `rows == cols == 1`, which gets
    /// tiled over the other operand's plane.
    pub fn broadcast(a: &Tensor, b: &Tensor) -> (Tensor, Tensor) {
        if a.channels == b.channels && a.rows == b.rows && a.cols == b.cols {
            return (a.clone(), b.clone());
        }
        assert_eq!(a.channels, b.channels, "broadcast requires matching channel counts");

        let tile = |scalar: &Tensor, shaped: &Tensor| -> Tensor {
            let mut out = Tensor::new(shaped.channels, shaped.rows, shaped.cols);
            for c in 0..shaped.channels {
                let v = scalar.at(c, 0, 0);
                for col in 0..shaped.cols {
                    for r in 0..shaped.rows {
                        *out.at_mut(c, r, col) = v;
                    }
                }
            }
            out
        };

        if b.rows == 1 && b.cols == 1 {
            (a.clone(), tile(b, a))
        } else if a.rows == 1 && a.cols == 1 {
            (tile(a, b), b.clone())
        } else {
            panic!("broadcast requires one operand with rows == cols == 1");
        }
    }

    pub fn elem_add(a: &Tensor, b: &Tensor) -> Tensor {
        let (a, b) = Tensor::broadcast(a, b);
        let mut out = a.clone();
        out.data.iter_mut().zip(b.data.iter()).for_each(|(o, &v)| *o += v);
        out
    }

    pub fn elem_mul(a: &Tensor, b: &Tensor) -> Tensor {
        let (a, b) = Tensor::broadcast(a, b);
        let mut out = a.clone();
        out.data.iter_mut().zip(b.data.iter()).for_each(|(o, &v)| *o *= v);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_equal_shapes_is_identity() {
        let a = Tensor::new(2, 3, 3);
        let b = Tensor::new(2, 3, 3);
        let (ra, rb) = Tensor::broadcast(&a, &b);
        assert_eq!(ra.raw_shape(), a.raw_shape());
        assert_eq!(rb.raw_shape(), b.raw_shape());
    }

    #[test]
    fn broadcast_tiles_scalar_channel() {
        let mut a = Tensor::new(2, 3, 3);
        a.fill(2.0);
        let mut scalar = Tensor::new(2, 1, 1);
        scalar.fill_values(&[10.0, 20.0], true);
        let sum = Tensor::elem_add(&a, &scalar);
        assert_eq!(sum.at(0, 0, 0), 12.0);
        assert_eq!(sum.at(1, 2, 2), 22.0);
    }

    #[test]
    fn elem_mul_matches_manual_product() {
        let mut a = Tensor::new(1, 2, 2);
        a.fill_values(&[1.0, 2.0, 3.0, 4.0], true);
        let mut b = Tensor::new(1, 2, 2);
        b.fill_values(&[2.0, 2.0, 2.0, 2.0], true);
        let out = Tensor::elem_mul(&a, &b);
        assert_eq!(out.values(true), vec![2.0, 4.0, 6.0, 8.0]);
    }
}
