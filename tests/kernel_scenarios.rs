//! End-to-end kernel scenarios driven entirely through the public API,
//! one per operator family, with results checked by hand or against a
//! naive reference implementation.

use nnrt::kernel::cat::Cat;
use nnrt::kernel::conv::Convolution;
use nnrt::kernel::expression::Expression;
use nnrt::kernel::linear::Linear;
use nnrt::kernel::softmax::Softmax;
use nnrt::kernel::{Kernel, Status};
use nnrt::operand::{handle, TensorHandle};
use nnrt::Tensor;

#[test]
fn concat_channel_four_to_two() {
    let make = |v: f32| {
        let mut t = Tensor::new(6, 32, 32);
        t.fill(v);
        t
    };
    let inputs: Vec<TensorHandle> =
        vec![handle(make(1.0)), handle(make(2.0)), handle(make(3.0)), handle(make(4.0))];
    let outputs: Vec<TensorHandle> = vec![handle(Tensor::new(1, 1, 1)), handle(Tensor::new(1, 1, 1))];

    let status = Cat::new(1).forward(&inputs, &outputs);
    assert_eq!(status, Status::Success);

    let out0 = outputs[0].read().unwrap();
    assert_eq!((out0.channels(), out0.rows(), out0.cols()), (12, 32, 32));
    for c in 0..6 {
        assert_eq!(out0.at(c, 0, 0), 1.0);
    }
    for c in 6..12 {
        assert_eq!(out0.at(c, 0, 0), 3.0);
    }

    let out1 = outputs[1].read().unwrap();
    for c in 0..6 {
        assert_eq!(out1.at(c, 0, 0), 2.0);
    }
    for c in 6..12 {
        assert_eq!(out1.at(c, 0, 0), 4.0);
    }
}

fn naive_conv(input: &Tensor, kernels: &[Vec<f32>], k_h: usize, k_w: usize) -> Tensor {
    let out_h = input.rows() - k_h + 1;
    let out_w = input.cols() - k_w + 1;
    let mut out = Tensor::new(kernels.len(), out_h, out_w);
    for (oc, kernel) in kernels.iter().enumerate() {
        for ow in 0..out_w {
            for oh in 0..out_h {
                let mut acc = 0.0f32;
                let mut idx = 0;
                for ic in 0..input.channels() {
                    for kw in 0..k_w {
                        for kh in 0..k_h {
                            acc += input.at(ic, oh + kh, ow + kw) * kernel[idx];
                            idx += 1;
                        }
                    }
                }
                *out.at_mut(oc, oh, ow) = acc;
            }
        }
    }
    out
}

#[test]
fn conv_3x3_stride_1_no_bias_matches_naive_reference() {
    let mut input = Tensor::new(32, 8, 8);
    input.rand();

    let mut kernels = Vec::new();
    let mut weight_flat = Vec::new();
    for _ in 0..8 {
        let mut k = Tensor::new(32, 3, 3);
        k.rand();
        let kv = k.values(false);
        kernels.push(kv.clone());
        weight_flat.extend(kv);
    }

    let conv = Convolution::new(8, 32, 3, 3, 0, 0, 1, 1, 1, weight_flat, None);
    let inputs = vec![handle(input.clone())];
    let outputs = vec![handle(Tensor::new(1, 1, 1))];
    assert_eq!(conv.forward(&inputs, &outputs), Status::Success);

    let out = outputs[0].read().unwrap();
    assert_eq!((out.channels(), out.rows(), out.cols()), (8, 6, 6));

    let expected = naive_conv(&input, &kernels, 3, 3);
    for c in 0..8 {
        for r in 0..6 {
            for w in 0..6 {
                assert!((out.at(c, r, w) - expected.at(c, r, w)).abs() < 1e-4);
            }
        }
    }
}

#[test]
fn linear_3_to_4_identity_like_weights() {
    let weight = vec![1.0, 2.0, 3.0].repeat(4);
    let linear = Linear::new(3, 4, weight, None);

    let mut input = Tensor::new(1, 3, 3);
    input.fill_values(&(1..=9).map(|x| x as f32).collect::<Vec<_>>(), true);

    let inputs = vec![handle(input)];
    let outputs = vec![handle(Tensor::new(1, 1, 1))];
    assert_eq!(linear.forward(&inputs, &outputs), Status::Success);

    let out = outputs[0].read().unwrap();
    for r in 0..4 {
        assert_eq!((0..3).map(|c| out.at(0, r, c)).collect::<Vec<_>>(), vec![30.0, 36.0, 42.0]);
    }
}

#[test]
fn softmax_dim1_on_2x3x4_sums_to_one_per_column() {
    let mut input = Tensor::new(2, 3, 4);
    let vs: Vec<f32> = (0..24).map(|x| x as f32).collect();
    input.fill_values(&vs, true);

    let softmax = Softmax::new(1);
    let inputs = vec![handle(input)];
    let outputs = vec![handle(Tensor::new(2, 3, 4))];
    assert_eq!(softmax.forward(&inputs, &outputs), Status::Success);

    let out = outputs[0].read().unwrap();
    let rowmajor = out.values(true);
    for c in 0..2 {
        for w in 0..4 {
            let sum: f32 = (0..3).map(|h| rowmajor[(c * 3 + h) * 4 + w]).sum();
            assert!((sum - 1.0).abs() < 1e-5, "column sum was {sum}");
        }
    }
}

#[test]
fn expression_mul_of_adds_over_four_constants() {
    let make = |v: f32| {
        let mut t = Tensor::new(3, 224, 224);
        t.fill(v);
        t
    };
    let inputs: Vec<TensorHandle> =
        vec![handle(make(2.0)), handle(make(3.0)), handle(make(4.0)), handle(make(4.0))];
    let outputs = vec![handle(Tensor::new(1, 1, 1))];

    let expr = Expression::new("mul(add(@0,@1),add(@2,@3))");
    assert_eq!(expr.forward(&inputs, &outputs), Status::Success);

    let out = outputs[0].read().unwrap();
    assert!(out.data().iter().all(|&v| (v - 40.0).abs() < 1e-5));
}
