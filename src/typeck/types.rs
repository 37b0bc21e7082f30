use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// The closed set of primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Int,
    Long,
    Float,
    Double,
    String,
    Bool,
    Char,
    Void,
}

impl PrimitiveKind {
    /// Strict lookup by source name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Int" | "int" => Some(Self::Int),
            "Long" | "long" => Some(Self::Long),
            "Float" | "float" => Some(Self::Float),
            "Double" | "double" => Some(Self::Double),
            "String" | "string" => Some(Self::String),
            "Bool" | "bool" | "Boolean" | "boolean" => Some(Self::Bool),
            "Char" | "char" => Some(Self::Char),
            "Void" | "void" | "Unit" => Some(Self::Void),
            _ => None,
        }
    }

    /// Total inference over primitive names. Unrecognized names become `String`.
    pub fn infer(name: &str) -> Self {
        Self::parse(name).unwrap_or(Self::String)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Float | Self::Double)
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Bool => "Bool",
            Self::Char => "Char",
            Self::Void => "Void",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimitiveType {
    pub name: String,
    pub kind: PrimitiveKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    Named { name: String, args: Vec<Type> },
    Optional(Box<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    Tuple(Vec<Type>),
    TypeParameter { name: String, bounds: Vec<Type> },
}

/// An immutable type reference. `span` is `None` for synthesized types.
///
/// Equality and hashing ignore the span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Type {
    kind: TypeKind,
    span: Option<Span>,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Type {}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl Type {
    pub fn primitive(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = PrimitiveKind::infer(&name);
        Self::synth(TypeKind::Primitive(PrimitiveType { name, kind }))
    }

    pub fn of_kind(kind: PrimitiveKind) -> Self {
        Self::primitive(kind.canonical_name())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::synth(TypeKind::Named { name: name.into(), args: Vec::new() })
    }

    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Self::synth(TypeKind::Named { name: name.into(), args })
    }

    pub fn optional(inner: Type) -> Self {
        Self::synth(TypeKind::Optional(Box::new(inner)))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::synth(TypeKind::Function { params, ret: Box::new(ret) })
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::synth(TypeKind::Tuple(elements))
    }

    pub fn type_parameter(name: impl Into<String>, bounds: Vec<Type>) -> Self {
        Self::synth(TypeKind::TypeParameter { name: name.into(), bounds })
    }

    fn synth(kind: TypeKind) -> Self {
        Self { kind, span: None }
    }

    /// Attach the source span this type was parsed from.
    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn display_name(&self) -> String {
        self.to_string()
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            TypeKind::Primitive(p) => Some(p.kind),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.primitive_kind() == Some(PrimitiveKind::Void)
    }

    /// Number of parameters (functions) or elements (tuples).
    pub fn arity(&self) -> Option<usize> {
        match &self.kind {
            TypeKind::Function { params, .. } => Some(params.len()),
            TypeKind::Tuple(elements) => Some(elements.len()),
            _ => None,
        }
    }

    /// Visit this type and every nested type, outermost first.
    pub fn walk(&self, f: &mut impl FnMut(&Type)) {
        f(self);
        match &self.kind {
            TypeKind::Primitive(_) => {}
            TypeKind::Named { args, .. } => args.iter().for_each(|a| a.walk(f)),
            TypeKind::Optional(inner) => inner.walk(f),
            TypeKind::Function { params, ret } => {
                params.iter().for_each(|p| p.walk(f));
                ret.walk(f);
            }
            TypeKind::Tuple(elements) => elements.iter().for_each(|e| e.walk(f)),
            TypeKind::TypeParameter { bounds, .. } => bounds.iter().for_each(|b| b.walk(f)),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type], sep: &str) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Primitive(p) => write!(f, "{}", p.name),
            TypeKind::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args, ", ")?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeKind::Optional(inner) => write!(f, "{inner}?"),
            TypeKind::Function { params, ret } => {
                write!(f, "(")?;
                write_list(f, params, ", ")?;
                write!(f, ") -> {ret}")
            }
            TypeKind::Tuple(elements) => {
                write!(f, "(")?;
                write_list(f, elements, ", ")?;
                write!(f, ")")
            }
            TypeKind::TypeParameter { name, bounds } => {
                write!(f, "{name}")?;
                if !bounds.is_empty() {
                    write!(f, ": ")?;
                    write_list(f, bounds, " + ")?;
                }
                Ok(())
            }
        }
    }
}

/// A resolved fully-qualified identity, e.g. `com.example.User`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Build from a package path and a simple name. An empty package yields the bare name.
    pub fn from_parts(package: &[impl AsRef<str>], simple: &str) -> Self {
        if package.is_empty() {
            return Self(simple.to_string());
        }
        let mut s = package.iter().map(|p| p.as_ref()).collect::<Vec<_>>().join(".");
        s.push('.');
        s.push_str(simple);
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Slash-delimited form used inside class files.
    pub fn internal_name(&self) -> String {
        self.0.replace('.', "/")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
