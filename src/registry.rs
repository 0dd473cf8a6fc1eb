//! Process-wide kernel registry: maps an operator-type string to the
//! constructor that builds it from a node's parameters/attributes.
//!
//! Populated once via `std::sync::OnceLock`, read-only afterwards.
//! Duplicate registration and missing lookups are both fatal: both are
//! programming errors (a typo'd operator key, or two kernels fighting over
//! the same registration), never something a caller can recover from.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::attribute::Attribute;
use crate::kernel::{conv, pooling, BoxedKernel, ParseStatus};
use crate::kernel::{activation, cat, expression, flatten, linear, softmax};
use crate::param::Parameter;

pub type Creator = fn(&HashMap<String, Parameter>, &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus>;

static REGISTRY: OnceLock<HashMap<&'static str, Creator>> = OnceLock::new();

pub fn registry() -> &'static HashMap<&'static str, Creator> {
    REGISTRY.get_or_init(build_registry)
}

pub fn lookup(type_name: &str) -> Creator {
    *registry()
        .get(type_name)
        .unwrap_or_else(|| panic!("no kernel registered for operator type {type_name:?}"))
}

fn build_registry() -> HashMap<&'static str, Creator> {
    let mut m: HashMap<&'static str, Creator> = HashMap::new();
    let mut register = |key: &'static str, creator: Creator| {
        if m.insert(key, creator).is_some() {
            panic!("duplicate kernel registration for operator type {key:?}");
        }
    };

    register("nn.ReLU", create_relu);
    register("nn.Sigmoid", create_sigmoid);
    register("nn.Hardsigmoid", create_hardsigmoid);
    register("nn.Hardswish", create_hardswish);
    register("nn.Softmax", create_softmax);
    register("F.softmax", create_softmax);
    register("torch.flatten", create_flatten);
    register("torch.cat", create_cat);
    register("nn.MaxPool2d", create_maxpool2d);
    register("nn.AdaptiveAvgPool2d", create_adaptive_avg_pool2d);
    register("nn.Linear", create_linear);
    register("nn.Conv2d", create_conv2d);
    register("pnnx.Expression", create_expression);

    m
}

fn int_param(params: &HashMap<String, Parameter>, key: &str) -> Option<i64> {
    params.get(key).and_then(Parameter::as_int)
}

fn int_list_param(params: &HashMap<String, Parameter>, key: &str) -> Option<Vec<i64>> {
    params.get(key).and_then(Parameter::as_int_list).map(|v| v.to_vec())
}

fn bool_param(params: &HashMap<String, Parameter>, key: &str) -> Option<bool> {
    params.get(key).and_then(Parameter::as_bool)
}

fn create_relu(_: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    Ok(Box::new(activation::Relu))
}

fn create_sigmoid(_: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    Ok(Box::new(activation::Sigmoid))
}

fn create_hardsigmoid(_: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    Ok(Box::new(activation::HardSigmoid))
}

fn create_hardswish(_: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    Ok(Box::new(activation::HardSwish))
}

fn create_softmax(params: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    let dim = int_param(params, "dim").ok_or(ParseStatus::ParamMissingDim)?;
    Ok(Box::new(softmax::Softmax::new(dim)))
}

fn create_flatten(params: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    let start = int_param(params, "start_dim").ok_or(ParseStatus::ParamMissingDim)?;
    let end = int_param(params, "end_dim").ok_or(ParseStatus::ParamMissingDim)?;
    Ok(Box::new(flatten::Flatten::new(start, end)))
}

fn create_cat(params: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    let dim = int_param(params, "dim").ok_or(ParseStatus::ParamMissingDim)?;
    Ok(Box::new(cat::Cat::new(dim)))
}

fn create_maxpool2d(params: &HashMap<String, Parameter>, _: &mut HashMap<String, Attribute>) -> Result<BoxedKernel, ParseStatus> {
    let k = int_list_param(params, "kernel_size").ok_or(ParseStatus::ParamMissingKernelSize)?;
    let s = int_list_param(params, "stride").ok_or(ParseStatus::ParamMissingStride)?;
    let p = int_list_param(params, "padding").ok_or(ParseStatus::ParamMissingPadding)?;
    Ok(Box::new(pooling::MaxPool2d::new(
        p[0] as usize,
        p[1] as usize,
        k[0] as usize,
        k[1] as usize,
        s[0] as usize,
        s[1] as usize,
    )))
}

fn create_adaptive_avg_pool2d(
    params: &HashMap<String, Parameter>,
    _: &mut HashMap<String, Attribute>,
) -> Result<BoxedKernel, ParseStatus> {
    let out = int_list_param(params, "output_size").ok_or(ParseStatus::ParamMissingOutHW)?;
    Ok(Box::new(pooling::AdaptiveAvgPool2d::new(out[0] as usize, out[1] as usize)))
}

fn create_linear(
    params: &HashMap<String, Parameter>,
    attrs: &mut HashMap<String, Attribute>,
) -> Result<BoxedKernel, ParseStatus> {
    let use_bias = bool_param(params, "bias").ok_or(ParseStatus::ParamMissingBias)?;
    let weight_attr = attrs.get_mut("weight").ok_or(ParseStatus::AttrMissingWeight)?;
    let out_features = *weight_attr.shape.first().ok_or(ParseStatus::AttrMissingOutFeatures)? as usize;
    let in_features = *weight_attr.shape.get(1).ok_or(ParseStatus::AttrMissingOutFeatures)? as usize;
    let weight = weight_attr.get_f32(true);
    let bias = if use_bias {
        Some(attrs.get_mut("bias").ok_or(ParseStatus::AttrMissingBias)?.get_f32(true))
    } else {
        None
    };
    Ok(Box::new(linear::Linear::new(in_features, out_features, weight, bias)))
}

fn create_conv2d(
    params: &HashMap<String, Parameter>,
    attrs: &mut HashMap<String, Attribute>,
) -> Result<BoxedKernel, ParseStatus> {
    let in_channels = int_param(params, "in_channels").ok_or(ParseStatus::ParamMissingInChannels)?;
    let out_channels = int_param(params, "out_channels").ok_or(ParseStatus::ParamMissingOutChannels)?;
    let k = int_list_param(params, "kernel_size").ok_or(ParseStatus::ParamMissingKernelSize)?;
    let s = int_list_param(params, "stride").ok_or(ParseStatus::ParamMissingStride)?;
    let p = int_list_param(params, "padding").ok_or(ParseStatus::ParamMissingPadding)?;
    let groups = int_param(params, "groups").ok_or(ParseStatus::ParamMissingGroups)?;
    let dilation = int_list_param(params, "dilation").ok_or(ParseStatus::ParamMissingDilation)?;
    let padding_mode = params
        .get("padding_mode")
        .and_then(Parameter::as_str)
        .ok_or(ParseStatus::ParamMissingPaddingMode)?;
    let use_bias = bool_param(params, "bias").ok_or(ParseStatus::ParamMissingBias)?;

    if padding_mode != "zeros" || dilation[0] != 1 || dilation[1] != 1 {
        return Err(ParseStatus::ParamMissingDilation);
    }

    let weight_attr = attrs.get_mut("weight").ok_or(ParseStatus::AttrMissingWeight)?;
    let weight = weight_attr.get_f32(true);
    let bias = if use_bias {
        Some(attrs.get_mut("bias").ok_or(ParseStatus::AttrMissingBias)?.get_f32(true))
    } else {
        None
    };

    Ok(Box::new(conv::Convolution::new(
        out_channels as usize,
        in_channels as usize,
        k[0] as usize,
        k[1] as usize,
        p[0] as usize,
        p[1] as usize,
        s[0] as usize,
        s[1] as usize,
        groups as usize,
        weight,
        bias,
    )))
}

fn create_expression(
    params: &HashMap<String, Parameter>,
    _: &mut HashMap<String, Attribute>,
) -> Result<BoxedKernel, ParseStatus> {
    let expr = params.get("expr").and_then(Parameter::as_str).ok_or(ParseStatus::ParamMissingExpr)?;
    Ok(Box::new(expression::Expression::new(expr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_operators_are_registered() {
        assert!(registry().contains_key("nn.Conv2d"));
        assert!(registry().contains_key("pnnx.Expression"));
    }

    #[test]
    #[should_panic(expected = "no kernel registered")]
    fn unknown_operator_is_fatal() {
        lookup("not.a.real.op");
    }

    #[test]
    fn relu_creator_ignores_params() {
        let params = HashMap::new();
        let mut attrs = HashMap::new();
        let kernel = create_relu(&params, &mut attrs).unwrap();
        assert_eq!(kernel.kernel_name(), "nn.ReLU");
    }
}
