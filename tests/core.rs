use volume_div::approx::{within, ApproxEquality};
use volume_div::backprop::{directional, divergence};
use volume_div::kernel::StepSize;
use volume_div::layer::{Divergence, Operator};
use volume_div::tensors::{Axis, Ten64, WithGrad};
use volume_div::DivError;

fn linear_field(dims: [usize; 5], steps: StepSize) -> Ten64 {
    Ten64::from_fn5(dims, |_, c, d, h, w| match c {
        0 => w as f64 * steps.x,
        1 => h as f64 * steps.y,
        _ => d as f64 * steps.z,
    })
}

#[test]
fn test_output_shape() {
    for dims in [[1, 3, 3, 3, 3], [2, 3, 4, 5, 6], [3, 3, 7, 3, 4]] {
        let input = WithGrad::new(Ten64::zeros(dims.to_vec()));
        let (out, _) = divergence(&input, StepSize::default()).unwrap();
        assert_eq!(out.shape, vec![dims[0], 1, dims[2], dims[3], dims[4]]);
    }
}

#[test]
fn test_linear_field_interior_and_borders() {
    let steps = StepSize::new(0.25, 1.0, 3.0);
    let dims = [1, 3, 4, 5, 6];
    let input = WithGrad::new(linear_field(dims, steps));
    let (out, _) = divergence(&input, steps).unwrap();

    // interior
    assert!((out.at5(0, 0, 1, 2, 3) - 3.0).abs() < 1e-12);
    // face, edge and corner points
    for (d, h, w) in [(0, 2, 3), (3, 0, 3), (1, 4, 5), (0, 0, 3), (3, 4, 0), (0, 0, 0), (3, 4, 5)] {
        let v = out.at5(0, 0, d, h, w);
        assert!((v - 3.0).abs() < 1e-12, "({d}, {h}, {w}) = {v}");
    }
}

#[test]
fn test_constant_field_is_divergence_free() {
    let input = WithGrad::new(Ten64::full(vec![1, 3, 3, 3, 3], 5.0));
    let (out, _) = divergence(&input, StepSize::default()).unwrap();
    assert_eq!(out, Ten64::zeros(vec![1, 1, 3, 3, 3]));
}

#[test]
fn test_zero_field_and_zero_gradient() {
    let zeros = WithGrad::new(Ten64::zeros(vec![2, 3, 3, 4, 3]));
    let (out, _) = divergence(&zeros, StepSize::default()).unwrap();
    assert!(out.data.iter().all(|&v| v == 0.0));

    let field = WithGrad::new(Ten64::from_fn5([2, 3, 3, 4, 3], |b, c, d, h, w| {
        ((b + 2 * c + 3 * d + 5 * h + 7 * w) % 4) as f64 - 1.5
    }));
    let (out, back) = divergence(&field, StepSize::default()).unwrap();
    let grad = back(&Ten64::zeros_like(&out)).unwrap();
    assert_eq!(grad, Ten64::zeros(vec![2, 3, 3, 4, 3]));
}

#[test]
fn test_step_scaling() {
    let field = WithGrad::new(Ten64::from_fn5([1, 3, 4, 3, 5], |_, c, d, h, w| {
        ((c + 1) * d * d + h * w) as f64 * 0.1
    }));
    let base = StepSize::new(1.0, 0.5, 2.0);
    let k = 4.0;
    let coarse = StepSize::new(base.x * k, base.y * k, base.z * k);

    let (fine_out, _) = divergence(&field, base).unwrap();
    let (coarse_out, _) = divergence(&field, coarse).unwrap();
    let expected = Ten64::new(fine_out.shape.clone(), fine_out.data.iter().map(|v| v / k).collect());
    assert!(within(&coarse_out, &expected, ApproxEquality::Precise));
}

#[test]
fn test_rejects_non_positive_steps() {
    for steps in [
        StepSize::new(0.0, 1.0, 1.0),
        StepSize::new(1.0, -0.5, 1.0),
        StepSize::new(1.0, 1.0, f64::NAN),
    ] {
        let err = Divergence::new(steps).unwrap_err();
        assert!(matches!(err, DivError::Configuration { .. }), "{err}");
    }
    let input = WithGrad::new(Ten64::zeros(vec![1, 3, 3, 3, 3]));
    assert!(matches!(
        divergence(&input, StepSize::uniform(-1.0)),
        Err(DivError::Configuration { axis: Axis::X, .. })
    ));
}

#[test]
fn test_forward_shape_errors() {
    let mut div = Divergence::default();
    for shape in [vec![1, 2, 3, 3, 3], vec![1, 4, 3, 3, 3], vec![3, 3, 3, 3], vec![1, 1, 3, 3, 3, 3]] {
        let err = div.forward(&Ten64::zeros(shape)).unwrap_err();
        assert!(matches!(err, DivError::ShapeMismatch { op: "forward", .. }), "{err}");
    }
}

#[test]
fn test_backward_shape_errors() {
    let input = WithGrad::new(Ten64::zeros(vec![2, 3, 3, 3, 4]));
    let (_, back) = divergence(&input, StepSize::default()).unwrap();
    for shape in [vec![2, 3, 3, 3, 4], vec![1, 1, 3, 3, 4], vec![2, 1, 3, 4, 3], vec![2, 1, 36]] {
        let err = back(&Ten64::zeros(shape)).unwrap_err();
        assert!(matches!(err, DivError::ShapeMismatch { op: "backward", .. }), "{err}");
    }
    assert!(back(&Ten64::zeros(vec![2, 1, 3, 3, 4])).is_ok());
}

#[test]
fn test_layer_matches_closure_api() {
    let steps = StepSize::new(0.5, 1.5, 1.0);
    let field = Ten64::from_fn5([2, 3, 3, 4, 5], |b, c, d, h, w| ((b * 7 + c * 5 + d * 3 + h * 2 + w) % 9) as f64);
    let grad_out = Ten64::from_fn5([2, 1, 3, 4, 5], |b, _, d, h, w| (b + d) as f64 - (h * w) as f64 * 0.25);

    let mut layer = Divergence::new(steps).unwrap();
    let layer_out = layer.forward(&field).unwrap();
    let layer_grad = layer.backward(&field, &grad_out).unwrap();

    let input = WithGrad::new(field);
    let (out, back) = divergence(&input, steps).unwrap();
    assert_eq!(out, layer_out);
    assert_eq!(back(&grad_out).unwrap(), layer_grad);
}

#[test]
fn test_divergence_is_sum_of_corrected_components() {
    let dims = [1, 3, 3, 4, 5];
    let field = WithGrad::new(Ten64::from_fn5(dims, |_, c, d, h, w| ((c + 1) * (d + 2 * h + 3 * w)) as f64 * 0.5 + (h * w) as f64));
    let (out, _) = divergence(&field, StepSize::default()).unwrap();

    let mut expected = Ten64::zeros(vec![1, 1, 3, 4, 5]);
    for axis in Axis::ALL {
        let (part, _) = directional(&field, axis, 1.0).unwrap();
        let n = dims[axis.dim()];
        for d in 0..3 {
            for h in 0..4 {
                for w in 0..5 {
                    let pos = [0, 0, d, h, w][axis.dim()];
                    let scale = if pos == 0 || pos == n - 1 { 2.0 } else { 1.0 };
                    expected.data[(d * 4 + h) * 5 + w] += scale * part.at5(0, 0, d, h, w);
                }
            }
        }
    }
    assert!(within(&out, &expected, ApproxEquality::Precise));
}

#[test]
fn test_gradient_accumulates_into_input() {
    let mut field = WithGrad::new(Ten64::full(vec![1, 3, 3, 3, 3], 1.0));
    let (out, back) = divergence(&field, StepSize::default()).unwrap();
    let grad = back(&Ten64::ones_like(&out)).unwrap();
    drop(back);
    field.accumulate(&grad).unwrap();
    field.accumulate(&grad).unwrap();
    let twice: Vec<f64> = grad.data.iter().map(|g| 2.0 * g).collect();
    assert_eq!(field.grad.data, twice);
}

#[test]
fn test_subnormal_step_is_rejected() {
    let err = Divergence::new(StepSize::uniform(1e-310)).unwrap_err();
    assert!(matches!(err, DivError::Configuration { axis: Axis::X, value } if value == 1e-310));
    let err = Divergence::new(StepSize::new(1.0, 1.0, 1e-310)).unwrap_err();
    assert!(matches!(err, DivError::Configuration { axis: Axis::Z, .. }));
}

#[test]
fn test_tiny_valid_step_keeps_constant_fields_flat() {
    let mut div = Divergence::new(StepSize::uniform(1e-300)).unwrap();
    for value in [0.0, 5.0] {
        let out = div.forward(&Ten64::full(vec![1, 3, 3, 3, 3], value)).unwrap();
        assert!(out.data.iter().all(|&v| v == 0.0), "{value}: {:?}", &out.data[..3]);
    }
}

#[test]
fn test_extent_two_doubles_each_border_once() {
    let dims = [1, 3, 2, 2, 2];
    let field = linear_field(dims, StepSize::default());
    let mut div = Divergence::default();

    let out = div.forward(&field).unwrap();
    assert_eq!(out.shape, vec![1, 1, 2, 2, 2]);
    assert!(out.data.iter().all(|&v| v == 3.0), "{:?}", out.data);

    let grad = div.backward(&field, &Ten64::ones_like(&out)).unwrap();
    assert_eq!(grad.shape, dims.to_vec());
    for axis in Axis::ALL {
        for d in 0..2 {
            for h in 0..2 {
                for w in 0..2 {
                    let pos = [0, 0, d, h, w][axis.dim()];
                    let expected = if pos == 0 { -2.0 } else { 2.0 };
                    assert_eq!(grad.at5(0, axis.channel(), d, h, w), expected, "{axis} at ({d}, {h}, {w})");
                }
            }
        }
    }
}

#[test]
fn test_extent_one_axis_contributes_nothing() {
    let dims = [1, 3, 1, 3, 3];
    let field = linear_field(dims, StepSize::default());
    let mut div = Divergence::default();

    let out = div.forward(&field).unwrap();
    assert_eq!(out.shape, vec![1, 1, 1, 3, 3]);
    // only the x and y terms remain
    assert!(out.data.iter().all(|&v| v == 2.0), "{:?}", out.data);

    let grad = div.backward(&field, &Ten64::ones_like(&out)).unwrap();
    assert_eq!(grad.shape, dims.to_vec());
    assert!(grad.data[18..].iter().all(|&v| v == 0.0));
}

#[test]
fn test_empty_fields() {
    let mut div = Divergence::default();
    for dims in [[0, 3, 3, 3, 3], [1, 3, 0, 3, 3]] {
        let field = Ten64::zeros(dims.to_vec());
        let out = div.forward(&field).unwrap();
        assert_eq!(out.shape, vec![dims[0], 1, dims[2], dims[3], dims[4]]);
        assert!(out.is_empty());

        let grad = div.backward(&field, &out).unwrap();
        assert_eq!(grad.shape, dims.to_vec());
        assert!(grad.is_empty());
    }
}
