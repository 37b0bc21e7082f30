use crate::ast::TypeParam;
use crate::diagnostics::CompileError;
use crate::typeck::types::{PrimitiveKind, Type, TypeKind};
use crate::typeck::TypeTable;

use super::code::VType;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";

/// A JVM value type as seen by the body lowering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Char,
    Void,
    /// Type of the `null` literal; assignable to any reference.
    Null,
    /// Internal name (`java/lang/String`) or array descriptor (`[I`).
    Reference(String),
}

impl JvmType {
    pub fn object() -> Self {
        Self::Reference(OBJECT.to_string())
    }

    pub fn string() -> Self {
        Self::Reference(STRING.to_string())
    }

    pub fn from_descriptor(desc: &str) -> Option<Self> {
        Some(match desc.as_bytes().first()? {
            b'I' | b'B' | b'S' => Self::Int,
            b'J' => Self::Long,
            b'F' => Self::Float,
            b'D' => Self::Double,
            b'Z' => Self::Bool,
            b'C' => Self::Char,
            b'V' => Self::Void,
            b'L' => Self::Reference(desc.strip_prefix('L')?.strip_suffix(';')?.to_string()),
            b'[' => Self::Reference(desc.to_string()),
            _ => return None,
        })
    }

    pub fn descriptor(&self) -> String {
        match self {
            Self::Int => "I".into(),
            Self::Long => "J".into(),
            Self::Float => "F".into(),
            Self::Double => "D".into(),
            Self::Bool => "Z".into(),
            Self::Char => "C".into(),
            Self::Void => "V".into(),
            Self::Null => format!("L{OBJECT};"),
            Self::Reference(name) if name.starts_with('[') => name.clone(),
            Self::Reference(name) => format!("L{name};"),
        }
    }

    /// Verification type of a value of this type on the operand stack.
    pub fn vtype(&self) -> VType {
        match self {
            Self::Int | Self::Bool | Self::Char => VType::Integer,
            Self::Long => VType::Long,
            Self::Float => VType::Float,
            Self::Double => VType::Double,
            Self::Void => VType::Top,
            Self::Null => VType::Null,
            Self::Reference(name) => VType::Object(name.clone()),
        }
    }

    /// Local-variable and operand-stack words.
    pub fn size(&self) -> u16 {
        match self {
            Self::Long | Self::Double => 2,
            Self::Void => 0,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_) | Self::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::Reference(name) if name == STRING)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Float | Self::Double)
    }

    /// Whether a value of type `self` can be passed where `target` is expected
    /// without conversion or subtype knowledge.
    pub fn assignable_to(&self, target: &JvmType) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (Self::Null, Self::Reference(_)) => true,
            (Self::Reference(_), Self::Reference(t)) => t == OBJECT,
            _ => false,
        }
    }
}

pub fn method_descriptor(params: &[JvmType], ret: &JvmType) -> String {
    let mut s = String::from("(");
    for p in params {
        s.push_str(&p.descriptor());
    }
    s.push(')');
    s.push_str(&ret.descriptor());
    s
}

/// Split `(IJLjava/lang/String;)V` into parameter and return types.
pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<JvmType>, JvmType)> {
    let rest = desc.strip_prefix('(')?;
    let (params, ret) = rest.split_once(')')?;
    let bytes = params.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while bytes.get(i) == Some(&b'[') {
            i += 1;
        }
        if bytes.get(i) == Some(&b'L') {
            i += params[i..].find(';')?;
        }
        i += 1;
        if i > bytes.len() {
            return None;
        }
        out.push(JvmType::from_descriptor(&params[start..i])?);
    }
    Some((out, JvmType::from_descriptor(ret)?))
}

fn boxed(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Int => "java/lang/Integer",
        PrimitiveKind::Long => "java/lang/Long",
        PrimitiveKind::Float => "java/lang/Float",
        PrimitiveKind::Double => "java/lang/Double",
        PrimitiveKind::Bool => "java/lang/Boolean",
        PrimitiveKind::Char => "java/lang/Character",
        PrimitiveKind::Void => "java/lang/Void",
        PrimitiveKind::String => STRING,
    }
}

/// Maps source types to JVM types using the analyzer's type table and the
/// type parameters of the enclosing declarations.
#[derive(Debug, Clone)]
pub struct TypeMapper<'a> {
    types: &'a TypeTable,
    params: Vec<(String, Option<Type>)>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(types: &'a TypeTable) -> Self {
        Self { types, params: Vec::new() }
    }

    pub fn with_params(&self, params: &[TypeParam]) -> Self {
        let mut mapper = self.clone();
        mapper
            .params
            .extend(params.iter().map(|p| (p.name.node.clone(), p.bounds.first().cloned())));
        mapper
    }

    pub fn map(&self, ty: &Type) -> Result<JvmType, CompileError> {
        Ok(match ty.kind() {
            TypeKind::Primitive(p) => match p.kind {
                PrimitiveKind::Int => JvmType::Int,
                PrimitiveKind::Long => JvmType::Long,
                PrimitiveKind::Float => JvmType::Float,
                PrimitiveKind::Double => JvmType::Double,
                PrimitiveKind::Bool => JvmType::Bool,
                PrimitiveKind::Char => JvmType::Char,
                PrimitiveKind::Void => JvmType::Void,
                PrimitiveKind::String => JvmType::string(),
            },
            TypeKind::Named { name, .. } => {
                if let Some((_, bound)) = self.params.iter().rev().find(|(n, _)| n == name) {
                    return self.erase_bound(bound.as_ref());
                }
                let resolved = self
                    .types
                    .get(name)
                    .ok_or_else(|| CompileError::lowering(format!("type '{name}' has no resolution in the type table")))?;
                JvmType::Reference(resolved.internal_name())
            }
            TypeKind::Optional(inner) => match inner.primitive_kind() {
                Some(kind) => JvmType::Reference(boxed(kind).to_string()),
                None => self.map(inner)?,
            },
            TypeKind::Function { params, ret } => {
                let void = ret.is_void();
                let iface = match (params.len(), void) {
                    (0, true) => "java/lang/Runnable",
                    (0, false) => "java/util/function/Supplier",
                    (1, true) => "java/util/function/Consumer",
                    (1, false) => "java/util/function/Function",
                    (2, true) => "java/util/function/BiConsumer",
                    (2, false) => "java/util/function/BiFunction",
                    _ => OBJECT,
                };
                JvmType::Reference(iface.to_string())
            }
            TypeKind::Tuple(_) => JvmType::Reference(format!("[L{OBJECT};")),
            TypeKind::TypeParameter { bounds, .. } => self.erase_bound(bounds.first())?,
        })
    }

    fn erase_bound(&self, bound: Option<&Type>) -> Result<JvmType, CompileError> {
        match bound {
            Some(b) => match self.map(b)? {
                JvmType::Reference(name) => Ok(JvmType::Reference(name)),
                other => Err(CompileError::lowering(format!("type bound '{b}' erases to non-reference {other:?}"))),
            },
            None => Ok(JvmType::object()),
        }
    }

    /// Map an optional return type, where `None` means void.
    pub fn map_return(&self, ty: Option<&Type>) -> Result<JvmType, CompileError> {
        ty.map_or(Ok(JvmType::Void), |t| self.map(t))
    }

    /// Internal name of a class-like type (superclass or interface position).
    pub fn internal_name(&self, ty: &Type) -> Result<String, CompileError> {
        match self.map(ty)? {
            JvmType::Reference(name) if !name.starts_with('[') => Ok(name),
            other => Err(CompileError::lowering(format!("'{ty}' is not a class type ({})", other.descriptor()))),
        }
    }
}
