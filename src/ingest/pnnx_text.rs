//! A minimal concrete `ModelSource`: a line-oriented text graph format
//! inspired by PNNX's param/bin export, plus a `.bin` file holding each
//! declared attribute's bytes back-to-back in declaration order.
//!
//! This is an adequate-for-this-repo convenience, not a byte-exact
//! reimplementation of every upstream PNNX/ncnn-param revision — see the
//! design notes on attribute indexing.
//!
//! Line grammar (whitespace-separated fields):
//! `<type> <name> <#inputs> <#outputs> <in-names...> <out-names...> [#out=(d0,d1,...)dtype ...] [$key=value ...] [@key=(d0,d1,...)dtype ...]`
//!
//! A `$key=value` whose `value` is the bare sentinel `?` (or empty) carries
//! no recognizable type, mirroring the original exporter's untyped/default
//! parameter tag; `load` rejects it as `IngestError::UnknownParamTag` rather
//! than silently degrading it to a string.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::param::Parameter;

use super::{IngestError, ParsedAttr, ParsedInputRef, ParsedModel, ParsedOperator, ParsedOutputRef};

pub struct PnnxTextSource;

fn dtype_tag(s: &str) -> i32 {
    match s {
        "f32" => 1,
        _ => 0,
    }
}

fn parse_shape(s: &str) -> Vec<i64> {
    s.trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().expect("shape component must be an integer"))
        .collect()
}

fn parse_annotation_value(raw: &str) -> (Vec<i64>, i32) {
    // raw looks like "(1,3,224,224)f32"
    let close = raw.rfind(')').expect("annotation missing closing paren");
    let shape = parse_shape(&raw[..=close]);
    let dtype = dtype_tag(&raw[close + 1..]);
    (shape, dtype)
}

/// `None` means `raw` carries no recognizable type tag at all (the bare `?`
/// sentinel, or an empty value) — the caller turns that into
/// `IngestError::UnknownParamTag` rather than guessing.
fn parse_param_value(raw: &str) -> Option<Parameter> {
    if raw == "?" || raw.is_empty() {
        return None;
    }
    if raw == "True" || raw == "False" {
        return Some(Parameter::Bool(raw == "True"));
    }
    if raw.starts_with('(') && raw.ends_with(')') {
        let inner = &raw[1..raw.len() - 1];
        let parts: Vec<&str> = inner.split(',').filter(|p| !p.is_empty()).collect();
        if parts.iter().all(|p| p.parse::<i64>().is_ok()) {
            return Some(Parameter::IntList(parts.iter().map(|p| p.parse().unwrap()).collect()));
        }
        if parts.iter().all(|p| p.parse::<f32>().is_ok()) {
            return Some(Parameter::FloatList(parts.iter().map(|p| p.parse().unwrap()).collect()));
        }
        return Some(Parameter::StringList(parts.iter().map(|p| p.to_string()).collect()));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Parameter::Int(i));
    }
    if let Ok(f) = raw.parse::<f32>() {
        return Some(Parameter::Float(f));
    }
    Some(Parameter::String(raw.to_string()))
}

impl super::ModelSource for PnnxTextSource {
    fn load(&self, param_path: &Path, bin_path: &Path) -> Result<ParsedModel, IngestError> {
        let text = fs::read_to_string(param_path).map_err(|source| IngestError::Io {
            path: param_path.display().to_string(),
            source,
        })?;
        let bin = fs::read(bin_path).map_err(|source| IngestError::Io {
            path: bin_path.display().to_string(),
            source,
        })?;

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

        // First pass: collect every `#name=(shape)dtype` output annotation
        // across the whole file, so input refs can resolve producer
        // shape/type regardless of declaration order.
        let mut operand_decls: HashMap<String, (Vec<i64>, i32)> = HashMap::new();
        for (line_no, line) in lines.iter().enumerate() {
            for field in line.split_whitespace() {
                if let Some(rest) = field.strip_prefix('#') {
                    let (name, value) = rest.split_once('=').ok_or_else(|| IngestError::MalformedLine {
                        line_no,
                        detail: format!("malformed shape annotation {field:?}"),
                    })?;
                    operand_decls.insert(name.to_string(), parse_annotation_value(value));
                }
            }
        }

        let mut bin_cursor = 0usize;
        let mut operators = Vec::with_capacity(lines.len());

        for (line_no, line) in lines.iter().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(IngestError::MalformedLine {
                    line_no,
                    detail: "expected at least type, name, #inputs, #outputs".into(),
                });
            }
            let type_name = fields[0].to_string();
            let name = fields[1].to_string();
            let num_inputs: usize = fields[2].parse().map_err(|_| IngestError::MalformedLine {
                line_no,
                detail: "input count must be an integer".into(),
            })?;
            let num_outputs: usize = fields[3].parse().map_err(|_| IngestError::MalformedLine {
                line_no,
                detail: "output count must be an integer".into(),
            })?;

            let names_start = 4;
            let input_names = &fields[names_start..names_start + num_inputs];
            let output_names = &fields[names_start + num_inputs..names_start + num_inputs + num_outputs];

            let mut inputs = Vec::with_capacity(num_inputs);
            for input_name in input_names {
                let (shape, type_tag) = operand_decls
                    .get(*input_name)
                    .map(|(s, t)| (s.clone(), *t))
                    .unwrap_or((Vec::new(), 0));
                inputs.push(ParsedInputRef {
                    producer: input_name.to_string(),
                    shape,
                    type_tag,
                });
            }
            let outputs: Vec<ParsedOutputRef> = output_names
                .iter()
                .map(|output_name| {
                    let (shape, type_tag) = operand_decls
                        .get(*output_name)
                        .map(|(s, t)| (s.clone(), *t))
                        .unwrap_or((Vec::new(), 0));
                    ParsedOutputRef { name: output_name.to_string(), shape, type_tag }
                })
                .collect();

            let mut params = HashMap::new();
            let mut attrs = HashMap::new();
            for field in &fields[names_start + num_inputs + num_outputs..] {
                if let Some(rest) = field.strip_prefix('$') {
                    let (key, value) = rest.split_once('=').ok_or_else(|| IngestError::MalformedLine {
                        line_no,
                        detail: format!("malformed parameter {field:?}"),
                    })?;
                    let parsed = parse_param_value(value).ok_or_else(|| IngestError::UnknownParamTag {
                        op: name.clone(),
                        tag: format!("{key}={value}"),
                    })?;
                    params.insert(key.to_string(), parsed);
                } else if let Some(rest) = field.strip_prefix('@') {
                    let (key, value) = rest.split_once('=').ok_or_else(|| IngestError::MalformedLine {
                        line_no,
                        detail: format!("malformed attribute {field:?}"),
                    })?;
                    let (shape, type_tag) = parse_annotation_value(value);
                    if type_tag != 1 {
                        return Err(IngestError::UnknownAttrTag { op: name.clone(), tag: value.to_string() });
                    }
                    let elems: usize = shape.iter().product::<i64>().max(1) as usize;
                    let byte_len = elems * 4;
                    if bin_cursor + byte_len > bin.len() {
                        return Err(IngestError::TruncatedBin {
                            op: name.clone(),
                            attr: key.to_string(),
                            needed: bin_cursor + byte_len - bin.len(),
                        });
                    }
                    let data = bin[bin_cursor..bin_cursor + byte_len].to_vec();
                    bin_cursor += byte_len;
                    attrs.insert(key.to_string(), ParsedAttr { type_tag, shape, data });
                } else if field.starts_with('#') {
                    // output shape annotation, already consumed in pass one
                } else {
                    return Err(IngestError::MalformedLine {
                        line_no,
                        detail: format!("unrecognized trailing field {field:?}"),
                    });
                }
            }

            operators.push(ParsedOperator {
                name,
                type_name,
                inputs,
                outputs,
                params,
                attrs,
            });
        }

        Ok(ParsedModel { operators })
    }
}
