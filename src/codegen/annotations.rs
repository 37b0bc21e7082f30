use crate::ast::{Annotation, AnnotationValue};
use crate::diagnostics::CompileError;
use crate::typeck::types::{PrimitiveKind, Type};

use super::descriptor::{AnnotationDescriptor, ElementValue};
use super::jvm::{JvmType, TypeMapper};

/// Request-mapping attributes that frameworks read as `String[]`. A scalar
/// written in one of these slots is wrapped into a one-element array.
const ARRAY_ATTRIBUTES: &[(&str, &str)] = &[
    ("GetMapping", "value"),
    ("GetMapping", "path"),
    ("PostMapping", "value"),
    ("PostMapping", "path"),
    ("PutMapping", "value"),
    ("PutMapping", "path"),
    ("DeleteMapping", "value"),
    ("DeleteMapping", "path"),
    ("PatchMapping", "value"),
    ("PatchMapping", "path"),
    ("RequestMapping", "value"),
    ("RequestMapping", "path"),
];

pub fn expects_array(annotation: &str, attribute: &str) -> bool {
    ARRAY_ATTRIBUTES.iter().any(|(a, attr)| *a == annotation && *attr == attribute)
}

pub fn lower_annotations(annotations: &[Annotation], mapper: &TypeMapper<'_>) -> Result<Vec<AnnotationDescriptor>, CompileError> {
    annotations.iter().map(|a| lower_annotation(a, mapper)).collect()
}

pub fn lower_annotation(annotation: &Annotation, mapper: &TypeMapper<'_>) -> Result<AnnotationDescriptor, CompileError> {
    let internal = mapper.internal_name(&Type::named(&annotation.name.node))?;
    let simple_name = internal.rsplit('/').next().unwrap_or(&internal).to_string();
    let mut elements = Vec::with_capacity(annotation.args.len());
    for arg in &annotation.args {
        let attribute = arg.attribute_name();
        let mut value = lower_value(&arg.value, mapper)?;
        if expects_array(&simple_name, attribute) && !matches!(value, ElementValue::Array(_)) {
            value = ElementValue::Array(vec![value]);
        }
        elements.push((attribute.to_string(), value));
    }
    Ok(AnnotationDescriptor { type_descriptor: format!("L{internal};"), simple_name, elements })
}

fn lower_value(value: &AnnotationValue, mapper: &TypeMapper<'_>) -> Result<ElementValue, CompileError> {
    Ok(match value {
        AnnotationValue::String(s) => ElementValue::String(s.clone()),
        AnnotationValue::Int(v) => ElementValue::Int(*v),
        AnnotationValue::Long(v) => ElementValue::Long(*v),
        AnnotationValue::Double(v) => ElementValue::Double(*v),
        AnnotationValue::Bool(v) => ElementValue::Bool(*v),
        AnnotationValue::Char(v) => ElementValue::Char(*v),
        AnnotationValue::Enum { ty, constant } => ElementValue::Enum {
            type_descriptor: format!("L{};", mapper.internal_name(&Type::named(ty))?),
            constant: constant.clone(),
        },
        AnnotationValue::Class(name) => {
            let ty = match PrimitiveKind::parse(name) {
                Some(_) => Type::primitive(name),
                None => Type::named(name),
            };
            let mapped: JvmType = mapper.map(&ty)?;
            ElementValue::Class(mapped.descriptor())
        }
        AnnotationValue::Array(items) => {
            ElementValue::Array(items.iter().map(|v| lower_value(v, mapper)).collect::<Result<_, _>>()?)
        }
    })
}
