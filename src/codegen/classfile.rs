//! Binary class-file writer (version 52.0).
//!
//! Members and attributes are encoded into a body buffer first so the constant
//! pool fills in first-use order; the header and pool are prepended at the end.

use std::collections::HashMap;

use crate::diagnostics::CompileError;

use super::code::{op, Code, Constant, Frame, Insn, Label, VType};
use super::descriptor::{AnnotationDescriptor, ClassDescriptor, ElementValue, FieldDescriptor, MethodDescriptor};
use super::jvm::parse_method_descriptor;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MAJOR_VERSION: u16 = 52;
pub const MINOR_VERSION: u16 = 0;

const MAX_POOL_INDEX: usize = 65_535;
const MAX_CODE_LENGTH: usize = 65_535;
const MAX_PARAMETER_WORDS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(String),
    String(String),
    NameAndType(String, String),
    Field(String, String, String),
    Method(String, String, String),
    InterfaceMethod(String, String, String),
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    bytes: Vec<u8>,
    index: HashMap<PoolKey, u16>,
    /// Next free slot; slot 0 is reserved.
    next: usize,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { bytes: Vec::new(), index: HashMap::new(), next: 1 }
    }

    /// `constant_pool_count` as written in the header.
    pub fn count(&self) -> u16 {
        self.next as u16
    }

    fn intern(&mut self, key: PoolKey, slots: usize, encode: impl FnOnce(&mut Self) -> Result<Vec<u8>, CompileError>) -> Result<u16, CompileError> {
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }
        // Operands are interned before the entry that refers to them.
        let entry = encode(self)?;
        if self.next + slots > MAX_POOL_INDEX {
            return Err(CompileError::class_file(format!("constant pool exceeds {} entries", MAX_POOL_INDEX - 1)));
        }
        let idx = self.next as u16;
        self.next += slots;
        self.bytes.extend_from_slice(&entry);
        self.index.insert(key, idx);
        Ok(idx)
    }

    pub fn utf8(&mut self, s: &str) -> Result<u16, CompileError> {
        self.intern(PoolKey::Utf8(s.to_string()), 1, |_| {
            let encoded = modified_utf8(s);
            let len = u16::try_from(encoded.len())
                .map_err(|_| CompileError::class_file(format!("string constant of {} bytes is too long", encoded.len())))?;
            let mut out = vec![1];
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&encoded);
            Ok(out)
        })
    }

    pub fn integer(&mut self, v: i32) -> Result<u16, CompileError> {
        self.intern(PoolKey::Integer(v), 1, |_| Ok(tagged(3, &v.to_be_bytes())))
    }

    pub fn float(&mut self, v: f32) -> Result<u16, CompileError> {
        self.intern(PoolKey::Float(v.to_bits()), 1, |_| Ok(tagged(4, &v.to_bits().to_be_bytes())))
    }

    pub fn long(&mut self, v: i64) -> Result<u16, CompileError> {
        self.intern(PoolKey::Long(v), 2, |_| Ok(tagged(5, &v.to_be_bytes())))
    }

    pub fn double(&mut self, v: f64) -> Result<u16, CompileError> {
        self.intern(PoolKey::Double(v.to_bits()), 2, |_| Ok(tagged(6, &v.to_bits().to_be_bytes())))
    }

    pub fn class(&mut self, internal_name: &str) -> Result<u16, CompileError> {
        self.intern(PoolKey::Class(internal_name.to_string()), 1, |pool| {
            let name = pool.utf8(internal_name)?;
            Ok(tagged(7, &name.to_be_bytes()))
        })
    }

    pub fn string(&mut self, s: &str) -> Result<u16, CompileError> {
        self.intern(PoolKey::String(s.to_string()), 1, |pool| {
            let utf = pool.utf8(s)?;
            Ok(tagged(8, &utf.to_be_bytes()))
        })
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        self.intern(PoolKey::NameAndType(name.to_string(), descriptor.to_string()), 1, |pool| {
            let n = pool.utf8(name)?;
            let d = pool.utf8(descriptor)?;
            Ok(tagged(12, &[n.to_be_bytes(), d.to_be_bytes()].concat()))
        })
    }

    fn member(&mut self, key: PoolKey, tag: u8, owner: &str, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        self.intern(key, 1, |pool| {
            let class = pool.class(owner)?;
            let nat = pool.name_and_type(name, descriptor)?;
            Ok(tagged(tag, &[class.to_be_bytes(), nat.to_be_bytes()].concat()))
        })
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        let key = PoolKey::Field(owner.into(), name.into(), descriptor.into());
        self.member(key, 9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        let key = PoolKey::Method(owner.into(), name.into(), descriptor.into());
        self.member(key, 10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        let key = PoolKey::InterfaceMethod(owner.into(), name.into(), descriptor.into());
        self.member(key, 11, owner, name, descriptor)
    }

    fn constant(&mut self, c: &Constant) -> Result<u16, CompileError> {
        match c {
            Constant::Int(v) => self.integer(*v),
            Constant::Long(v) => self.long(*v),
            Constant::Float(v) => self.float(*v),
            Constant::Double(v) => self.double(*v),
            Constant::String(s) => self.string(s),
        }
    }
}

fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(tag);
    out.extend_from_slice(payload);
    out
}

/// The JVM's variant of UTF-8: NUL is two bytes and supplementary characters
/// are written as encoded surrogate pairs.
pub fn modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[derive(Default)]
struct Buf(Vec<u8>);

impl Buf {
    fn u1(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u2(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn u4(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.0.extend_from_slice(b);
    }

    fn attribute(&mut self, pool: &mut ConstantPool, name: &str, body: &[u8]) -> Result<(), CompileError> {
        let name_idx = pool.utf8(name)?;
        let len = u32::try_from(body.len()).map_err(|_| CompileError::class_file(format!("attribute {name} too large")))?;
        self.u2(name_idx);
        self.u4(len);
        self.bytes(body);
        Ok(())
    }
}

fn count_u2(n: usize, what: &str) -> Result<u16, CompileError> {
    u16::try_from(n).map_err(|_| CompileError::class_file(format!("too many {what}: {n}")))
}

/// Encode one class.
pub fn write_class(class: &ClassDescriptor) -> Result<Vec<u8>, CompileError> {
    let mut pool = ConstantPool::new();
    let mut body = Buf::default();

    body.u2(class.access);
    body.u2(pool.class(&class.internal_name)?);
    body.u2(pool.class(&class.superclass)?);
    body.u2(count_u2(class.interfaces.len(), "interfaces")?);
    for iface in &class.interfaces {
        body.u2(pool.class(iface)?);
    }

    body.u2(count_u2(class.fields.len(), "fields")?);
    for field in &class.fields {
        write_field(field, &mut pool, &mut body)?;
    }

    body.u2(count_u2(class.methods.len(), "methods")?);
    for method in &class.methods {
        write_method(method, &mut pool, &mut body)
            .map_err(|e| in_member(e, &class.internal_name, &method.name))?;
    }

    let mut attrs = Buf::default();
    let mut attr_count = 0u16;
    if let Some(source) = &class.source_file {
        let idx = pool.utf8(source)?;
        attrs.attribute(&mut pool, "SourceFile", &idx.to_be_bytes())?;
        attr_count += 1;
    }
    if !class.annotations.is_empty() {
        let encoded = annotations_attribute(&class.annotations, &mut pool)?;
        attrs.attribute(&mut pool, "RuntimeVisibleAnnotations", &encoded)?;
        attr_count += 1;
    }
    body.u2(attr_count);
    body.bytes(&attrs.0);

    let mut out = Buf::default();
    out.u4(MAGIC);
    out.u2(MINOR_VERSION);
    out.u2(MAJOR_VERSION);
    out.u2(pool.count());
    out.bytes(&pool.bytes);
    out.bytes(&body.0);
    Ok(out.0)
}

fn in_member(err: CompileError, class: &str, member: &str) -> CompileError {
    match err {
        CompileError::ClassFile { msg } => CompileError::class_file(format!("{class}.{member}: {msg}")),
        other => other,
    }
}

fn write_field(field: &FieldDescriptor, pool: &mut ConstantPool, out: &mut Buf) -> Result<(), CompileError> {
    out.u2(field.access);
    out.u2(pool.utf8(&field.name)?);
    out.u2(pool.utf8(&field.descriptor)?);
    if field.annotations.is_empty() {
        out.u2(0);
    } else {
        out.u2(1);
        let encoded = annotations_attribute(&field.annotations, pool)?;
        out.attribute(pool, "RuntimeVisibleAnnotations", &encoded)?;
    }
    Ok(())
}

fn write_method(method: &MethodDescriptor, pool: &mut ConstantPool, out: &mut Buf) -> Result<(), CompileError> {
    let (params, _) = parse_method_descriptor(&method.descriptor)
        .ok_or_else(|| CompileError::class_file(format!("malformed method descriptor {}", method.descriptor)))?;
    let words: usize = params.iter().map(|p| p.size() as usize).sum::<usize>() + usize::from(!method.is_static());
    if words > MAX_PARAMETER_WORDS {
        return Err(CompileError::class_file(format!("{words} parameter slots exceed the limit of {MAX_PARAMETER_WORDS}")));
    }

    out.u2(method.access);
    out.u2(pool.utf8(&method.name)?);
    out.u2(pool.utf8(&method.descriptor)?);

    let mut attrs = Buf::default();
    let mut count = 0u16;

    let code = encode_code(&method.code, pool)?;
    attrs.attribute(pool, "Code", &code)?;
    count += 1;

    let mut mp = Buf::default();
    mp.u1(method.parameter_names.len() as u8);
    for name in &method.parameter_names {
        mp.u2(pool.utf8(name)?);
        mp.u2(0);
    }
    attrs.attribute(pool, "MethodParameters", &mp.0)?;
    count += 1;

    if !method.annotations.is_empty() {
        let encoded = annotations_attribute(&method.annotations, pool)?;
        attrs.attribute(pool, "RuntimeVisibleAnnotations", &encoded)?;
        count += 1;
    }
    if method.parameter_annotations.iter().any(|p| !p.is_empty()) {
        let mut pa = Buf::default();
        pa.u1(method.parameter_annotations.len() as u8);
        for anns in &method.parameter_annotations {
            pa.u2(count_u2(anns.len(), "parameter annotations")?);
            for ann in anns {
                encode_annotation(ann, pool, &mut pa)?;
            }
        }
        attrs.attribute(pool, "RuntimeVisibleParameterAnnotations", &pa.0)?;
        count += 1;
    }

    out.u2(count);
    out.bytes(&attrs.0);
    Ok(())
}

fn encode_code(code: &Code, pool: &mut ConstantPool) -> Result<Vec<u8>, CompileError> {
    let mut offsets = HashMap::new();
    let mut pc = 0usize;
    for insn in &code.insns {
        if let Insn::Label(label) = insn {
            offsets.insert(*label, pc);
        }
        pc += insn.len();
    }
    let code_len = pc;
    if code_len == 0 || code_len > MAX_CODE_LENGTH {
        return Err(CompileError::class_file(format!("method body of {code_len} bytes is outside the allowed range")));
    }

    let label_at = |label: &Label| -> Result<usize, CompileError> {
        offsets.get(label).copied().ok_or_else(|| CompileError::class_file(format!("label {} is never placed", label.0)))
    };

    let mut bytecode = Buf::default();
    for insn in &code.insns {
        let here = bytecode.0.len();
        match insn {
            Insn::Label(_) => {}
            Insn::Op(opcode) => bytecode.u1(*opcode),
            Insn::PushInt(v) => match *v {
                -1..=5 => bytecode.u1((op::ICONST_M1 as i32 + 1 + *v) as u8),
                -128..=127 => {
                    bytecode.u1(op::BIPUSH);
                    bytecode.u1(*v as i8 as u8);
                }
                -32768..=32767 => {
                    bytecode.u1(op::SIPUSH);
                    bytecode.u2(*v as i16 as u16);
                }
                _ => {
                    bytecode.u1(op::LDC_W);
                    bytecode.u2(pool.integer(*v)?);
                }
            },
            Insn::Ldc(c) => {
                bytecode.u1(if c.is_wide() { op::LDC2_W } else { op::LDC_W });
                bytecode.u2(pool.constant(c)?);
            }
            Insn::Local { op: opcode, slot } => encode_local(*opcode, *slot, &mut bytecode),
            Insn::Field { op: opcode, owner, name, descriptor } => {
                bytecode.u1(*opcode);
                bytecode.u2(pool.field_ref(owner, name, descriptor)?);
            }
            Insn::Invoke { op: opcode, owner, name, descriptor } if *opcode == op::INVOKEINTERFACE => {
                let (params, _) = parse_method_descriptor(descriptor)
                    .ok_or_else(|| CompileError::class_file(format!("malformed method descriptor {descriptor}")))?;
                let words: u16 = 1 + params.iter().map(|p| p.size()).sum::<u16>();
                bytecode.u1(*opcode);
                bytecode.u2(pool.interface_method_ref(owner, name, descriptor)?);
                bytecode.u1(words as u8);
                bytecode.u1(0);
            }
            Insn::Invoke { op: opcode, owner, name, descriptor } => {
                bytecode.u1(*opcode);
                bytecode.u2(pool.method_ref(owner, name, descriptor)?);
            }
            Insn::Type { op: opcode, class } => {
                bytecode.u1(*opcode);
                bytecode.u2(pool.class(class)?);
            }
            Insn::Jump { op: opcode, target } => {
                let delta = label_at(target)? as i64 - here as i64;
                let delta = i16::try_from(delta)
                    .map_err(|_| CompileError::class_file(format!("branch offset {delta} does not fit in 16 bits")))?;
                bytecode.u1(*opcode);
                bytecode.u2(delta as u16);
            }
        }
    }

    let mut out = Buf::default();
    out.u2(code.max_stack);
    out.u2(code.max_locals);
    out.u4(code_len as u32);
    out.bytes(&bytecode.0);
    out.u2(0); // exception table

    let table = stack_map_table(&code.frames, &offsets, code_len, pool)?;
    match table {
        Some(smt) => {
            out.u2(1);
            out.attribute(pool, "StackMapTable", &smt)?;
        }
        None => out.u2(0),
    }
    Ok(out.0)
}

fn encode_local(opcode: u8, slot: u16, out: &mut Buf) {
    let short_base = match opcode {
        op::ILOAD..=op::ALOAD => Some(0x1a + (opcode - op::ILOAD) * 4),
        op::ISTORE..=op::ASTORE => Some(0x3b + (opcode - op::ISTORE) * 4),
        _ => None,
    };
    match (short_base, slot) {
        (Some(base), 0..=3) => out.u1(base + slot as u8),
        (_, 0..=255) => {
            out.u1(opcode);
            out.u1(slot as u8);
        }
        _ => {
            out.u1(op::WIDE);
            out.u1(opcode);
            out.u2(slot);
        }
    }
}

fn stack_map_table(
    frames: &[(Label, Frame)],
    offsets: &HashMap<Label, usize>,
    code_len: usize,
    pool: &mut ConstantPool,
) -> Result<Option<Vec<u8>>, CompileError> {
    let mut placed: Vec<(usize, &Frame)> = frames
        .iter()
        .filter_map(|(label, frame)| offsets.get(label).map(|&off| (off, frame)))
        .filter(|(off, _)| *off < code_len)
        .collect();
    placed.sort_by_key(|(off, _)| *off);
    placed.dedup_by_key(|(off, _)| *off);
    if placed.is_empty() {
        return Ok(None);
    }

    let mut out = Buf::default();
    out.u2(count_u2(placed.len(), "stack map frames")?);
    let mut previous: Option<usize> = None;
    for (offset, frame) in placed {
        let delta = match previous {
            None => offset,
            Some(prev) => offset - prev - 1,
        };
        previous = Some(offset);
        out.u1(255);
        out.u2(delta as u16);

        let mut locals = Buf::default();
        let mut n_locals = 0u16;
        let mut iter = frame.locals.iter();
        while let Some(vt) = iter.next() {
            encode_vtype(vt, offsets, pool, &mut locals)?;
            n_locals += 1;
            if matches!(vt, VType::Long | VType::Double) {
                // Implicit second word.
                iter.next();
            }
        }
        out.u2(n_locals);
        out.bytes(&locals.0);

        out.u2(count_u2(frame.stack.len(), "stack entries")?);
        for vt in &frame.stack {
            encode_vtype(vt, offsets, pool, &mut out)?;
        }
    }
    Ok(Some(out.0))
}

fn encode_vtype(vt: &VType, offsets: &HashMap<Label, usize>, pool: &mut ConstantPool, out: &mut Buf) -> Result<(), CompileError> {
    match vt {
        VType::Top => out.u1(0),
        VType::Integer => out.u1(1),
        VType::Float => out.u1(2),
        VType::Double => out.u1(3),
        VType::Long => out.u1(4),
        VType::Null => out.u1(5),
        VType::UninitializedThis => out.u1(6),
        VType::Object(class) => {
            out.u1(7);
            out.u2(pool.class(class)?);
        }
        VType::Uninitialized(label) => {
            let offset = offsets
                .get(label)
                .ok_or_else(|| CompileError::class_file("uninitialized value without a `new` site"))?;
            out.u1(8);
            out.u2(*offset as u16);
        }
    }
    Ok(())
}

fn annotations_attribute(annotations: &[AnnotationDescriptor], pool: &mut ConstantPool) -> Result<Vec<u8>, CompileError> {
    let mut out = Buf::default();
    out.u2(count_u2(annotations.len(), "annotations")?);
    for ann in annotations {
        encode_annotation(ann, pool, &mut out)?;
    }
    Ok(out.0)
}

fn encode_annotation(ann: &AnnotationDescriptor, pool: &mut ConstantPool, out: &mut Buf) -> Result<(), CompileError> {
    out.u2(pool.utf8(&ann.type_descriptor)?);
    out.u2(count_u2(ann.elements.len(), "annotation elements")?);
    for (name, value) in &ann.elements {
        out.u2(pool.utf8(name)?);
        encode_element(value, pool, out)?;
    }
    Ok(())
}

fn encode_element(value: &ElementValue, pool: &mut ConstantPool, out: &mut Buf) -> Result<(), CompileError> {
    out.u1(value.tag());
    match value {
        ElementValue::String(s) => out.u2(pool.utf8(s)?),
        ElementValue::Int(v) => out.u2(pool.integer(*v)?),
        ElementValue::Long(v) => out.u2(pool.long(*v)?),
        ElementValue::Double(v) => out.u2(pool.double(*v)?),
        ElementValue::Bool(v) => out.u2(pool.integer(i32::from(*v))?),
        ElementValue::Char(c) => out.u2(pool.integer(*c as i32)?),
        ElementValue::Enum { type_descriptor, constant } => {
            out.u2(pool.utf8(type_descriptor)?);
            out.u2(pool.utf8(constant)?);
        }
        ElementValue::Class(descriptor) => out.u2(pool.utf8(descriptor)?),
        ElementValue::Array(items) => {
            out.u2(count_u2(items.len(), "array elements")?);
            for item in items {
                encode_element(item, pool, out)?;
            }
        }
    }
    Ok(())
}
