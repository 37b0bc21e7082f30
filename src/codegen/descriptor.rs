//! In-memory form of the classes a unit lowers to. Written out by
//! [`super::classfile`]; tests inspect these directly.

use super::code::Code;

pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    /// `a/b/Name`.
    pub internal_name: String,
    pub superclass: String,
    pub interfaces: Vec<String>,
    pub access: u16,
    pub source_file: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub annotations: Vec<AnnotationDescriptor>,
}

impl ClassDescriptor {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn simple_name(&self) -> &str {
        self.internal_name.rsplit('/').next().unwrap_or(&self.internal_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub annotations: Vec<AnnotationDescriptor>,
}

impl FieldDescriptor {
    pub fn is_final(&self) -> bool {
        self.access & access::FINAL != 0
    }
}

/// Where a method came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOrigin {
    Declared,
    Constructor,
    Accessor,
    /// `main(String[])` forwarding to the unit's zero-argument `main`.
    EntryBridge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub parameter_names: Vec<String>,
    pub origin: MethodOrigin,
    pub annotations: Vec<AnnotationDescriptor>,
    /// One list per parameter, possibly empty.
    pub parameter_annotations: Vec<Vec<AnnotationDescriptor>>,
    pub code: Code,
    pub(crate) stub_reason: Option<String>,
}

impl MethodDescriptor {
    /// Why the body was replaced by a throwing stub, if it was.
    pub fn stub_reason(&self) -> Option<&str> {
        self.stub_reason.as_deref()
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDescriptor {
    /// `Lorg/springframework/web/bind/annotation/GetMapping;`.
    pub type_descriptor: String,
    pub simple_name: String,
    pub elements: Vec<(String, ElementValue)>,
}

impl AnnotationDescriptor {
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    Enum { type_descriptor: String, constant: String },
    /// Class literal, as a return descriptor (`Ljava/lang/String;`, `I`).
    Class(String),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    /// Tag byte of the `element_value` structure.
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::String(_) => b's',
            ElementValue::Int(_) => b'I',
            ElementValue::Long(_) => b'J',
            ElementValue::Double(_) => b'D',
            ElementValue::Bool(_) => b'Z',
            ElementValue::Char(_) => b'C',
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class(_) => b'c',
            ElementValue::Array(_) => b'[',
        }
    }
}
