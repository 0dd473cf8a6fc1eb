//! Tensor invariants exercised through the public API only.

use nnrt::Tensor;

#[test]
fn raw_shape_product_equals_physical_size() {
    for (c, h, w) in [(1, 1, 7), (1, 5, 7), (3, 5, 7), (4, 1, 1)] {
        let t = Tensor::new(c, h, w);
        let product: usize = t.raw_shape().iter().product();
        assert_eq!(product, t.size());
        assert_eq!(t.size(), c * h * w);
    }
}

#[test]
fn column_major_reshape_is_a_pure_reinterpretation() {
    let mut t = Tensor::new(2, 3, 4);
    t.rand();
    let reshaped = t.reshape(&[2, 12], false);
    let back = reshaped.reshape(&[2, 3, 4], false);
    assert!(t.is_same(&back));
}

#[test]
fn broadcast_of_equal_shapes_is_identity() {
    let mut a = Tensor::new(3, 4, 4);
    a.rand();
    let b = a.clone();
    let (ra, rb) = Tensor::broadcast(&a, &b);
    assert!(ra.is_same(&a));
    assert!(rb.is_same(&b));
}
