//! Symbolic method bodies.
//!
//! [`CodeBuilder`] keeps a model of the operand stack and local slots while
//! instructions are appended, so that `max_stack`, `max_locals` and the
//! `StackMapTable` frames fall out of construction. Constant-pool indices and
//! branch offsets are only assigned when the class file is written.
//!
//! Emission is a no-op while the current position is unreachable (after a
//! `goto`, return or `athrow`, until a label with a recorded frame is bound),
//! so dead code never reaches the class file.

use std::collections::HashMap;

use super::jvm::{parse_method_descriptor, JvmType};

pub mod op {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const ISTORE: u8 = 0x36;
    pub const LSTORE: u8 = 0x37;
    pub const FSTORE: u8 = 0x38;
    pub const DSTORE: u8 = 0x39;
    pub const ASTORE: u8 = 0x3a;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const IADD: u8 = 0x60;
    pub const ISUB: u8 = 0x64;
    pub const IMUL: u8 = 0x68;
    pub const IDIV: u8 = 0x6c;
    pub const IREM: u8 = 0x70;
    pub const INEG: u8 = 0x74;
    pub const LCMP: u8 = 0x94;
    pub const FCMPL: u8 = 0x95;
    pub const FCMPG: u8 = 0x96;
    pub const DCMPL: u8 = 0x97;
    pub const DCMPG: u8 = 0x98;
    pub const IFEQ: u8 = 0x99;
    pub const IFNE: u8 = 0x9a;
    pub const IFLT: u8 = 0x9b;
    pub const IFGE: u8 = 0x9c;
    pub const IFGT: u8 = 0x9d;
    pub const IFLE: u8 = 0x9e;
    pub const IF_ICMPEQ: u8 = 0x9f;
    pub const IF_ICMPNE: u8 = 0xa0;
    pub const IF_ICMPLT: u8 = 0xa1;
    pub const IF_ICMPGE: u8 = 0xa2;
    pub const IF_ICMPGT: u8 = 0xa3;
    pub const IF_ICMPLE: u8 = 0xa4;
    pub const GOTO: u8 = 0xa7;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const FRETURN: u8 = 0xae;
    pub const DRETURN: u8 = 0xaf;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const NEW: u8 = 0xbb;
    pub const ATHROW: u8 = 0xbf;
    pub const WIDE: u8 = 0xc4;
}

/// Verification type, as written into `StackMapTable` frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Internal class name or array descriptor.
    Object(String),
    /// Result of the `new` instruction that directly follows the label.
    Uninitialized(Label),
}

impl VType {
    pub fn size(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Constant {
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Label(Label),
    /// Opcode without operands.
    Op(u8),
    /// `bipush`, `sipush` or `ldc_w` as the value requires; `iconst_*` for -1..=5.
    PushInt(i32),
    Ldc(Constant),
    /// Load or store opcode (`iload`, `astore`, ...) with its slot.
    Local { op: u8, slot: u16 },
    Field { op: u8, owner: String, name: String, descriptor: String },
    Invoke { op: u8, owner: String, name: String, descriptor: String },
    /// `new`, `checkcast` and friends.
    Type { op: u8, class: String },
    Jump { op: u8, target: Label },
}

impl Insn {
    /// Encoded length in bytes. Independent of constant-pool indices.
    pub fn len(&self) -> usize {
        match self {
            Insn::Label(_) => 0,
            Insn::Op(_) => 1,
            Insn::PushInt(v) => match *v {
                -1..=5 => 1,
                -128..=127 => 2,
                _ => 3,
            },
            Insn::Ldc(_) => 3,
            Insn::Local { op: opcode, slot } => {
                if is_local_op(*opcode) && *slot <= 3 {
                    1
                } else if *slot <= 255 {
                    2
                } else {
                    4
                }
            }
            Insn::Invoke { op, .. } if *op == op::INVOKEINTERFACE => 5,
            Insn::Field { .. } | Insn::Invoke { .. } | Insn::Type { .. } | Insn::Jump { .. } => 3,
        }
    }
}

fn is_local_op(opcode: u8) -> bool {
    matches!(opcode, op::ILOAD..=op::ALOAD | op::ISTORE..=op::ASTORE)
}

/// Locals (slot-indexed; the second word of a long/double is `Top`) and stack entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

/// A finished method body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: Vec<Insn>,
    /// Frames for branch targets, in binding order.
    pub frames: Vec<(Label, Frame)>,
}

impl Code {
    /// Opcodes in order, labels omitted. Handy for inspecting bodies.
    pub fn opcodes(&self) -> Vec<u8> {
        self.insns
            .iter()
            .filter_map(|i| match i {
                Insn::Label(_) => None,
                Insn::Op(op) | Insn::Local { op, .. } | Insn::Field { op, .. } | Insn::Invoke { op, .. } | Insn::Type { op, .. } | Insn::Jump { op, .. } => Some(*op),
                Insn::PushInt(v) => Some(match *v {
                    -1..=5 => (op::ICONST_M1 as i32 + 1 + *v) as u8,
                    -128..=127 => op::BIPUSH,
                    -32768..=32767 => op::SIPUSH,
                    _ => op::LDC_W,
                }),
                Insn::Ldc(c) if c.is_wide() => Some(op::LDC2_W),
                Insn::Ldc(_) => Some(op::LDC_W),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct LabelState {
    /// Locals at or above this slot are out of scope at the label.
    locals_mark: u16,
    frame: Option<Frame>,
    bound: bool,
}

pub struct CodeBuilder {
    insns: Vec<Insn>,
    locals: Vec<VType>,
    stack: Vec<VType>,
    stack_words: u16,
    max_stack: u16,
    next_slot: u16,
    max_locals: u16,
    reachable: bool,
    labels: HashMap<Label, LabelState>,
    next_label: u32,
    frame_order: Vec<Label>,
    this_class: Option<String>,
}

impl CodeBuilder {
    /// Start a body whose first locals hold `this` and the parameters.
    pub fn new(initial_locals: Vec<VType>) -> Self {
        let mut builder = Self {
            insns: Vec::new(),
            locals: Vec::new(),
            stack: Vec::new(),
            stack_words: 0,
            max_stack: 0,
            next_slot: 0,
            max_locals: 0,
            reachable: true,
            labels: HashMap::new(),
            next_label: 0,
            frame_order: Vec::new(),
            this_class: None,
        };
        for vt in initial_locals {
            builder.allocate(vt);
        }
        builder
    }

    /// Class whose constructor is being built; `UninitializedThis` becomes this type.
    pub fn with_this_class(mut self, class: impl Into<String>) -> Self {
        self.this_class = Some(class.into());
        self
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// First slot not yet handed out. Slots are never reused.
    pub fn locals_mark(&self) -> u16 {
        self.next_slot
    }

    /// Reserve a slot (two for long/double) typed `vt`.
    pub fn allocate(&mut self, vt: VType) -> u16 {
        let slot = self.next_slot;
        let size = vt.size();
        self.set_local(slot, vt);
        self.next_slot = self.next_slot.saturating_add(size);
        self.max_locals = self.max_locals.max(self.next_slot);
        slot
    }

    pub fn set_local(&mut self, slot: u16, vt: VType) {
        let size = vt.size() as usize;
        let needed = slot as usize + size;
        if self.locals.len() < needed {
            self.locals.resize(needed, VType::Top);
        }
        self.locals[slot as usize] = vt;
        if size == 2 {
            self.locals[slot as usize + 1] = VType::Top;
        }
    }

    /// Locals from `mark` on leave scope: the verifier sees `Top` there.
    pub fn end_scope(&mut self, mark: u16) {
        let mark = mark as usize;
        if self.locals.len() > mark {
            self.locals.truncate(mark);
        }
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        self.labels.insert(label, LabelState { locals_mark: self.next_slot, frame: None, bound: false });
        label
    }

    fn snapshot(&self, mark: u16) -> Frame {
        let mut locals: Vec<VType> = self.locals.iter().take(mark as usize).cloned().collect();
        while locals.last() == Some(&VType::Top) {
            locals.pop();
        }
        // A trailing long/double must keep its implicit second word.
        if matches!(locals.last(), Some(VType::Long | VType::Double)) {
            locals.push(VType::Top);
        }
        Frame { locals, stack: self.stack.clone() }
    }

    fn record_frame(&mut self, label: Label) {
        let mark = self.labels.get(&label).map_or(self.next_slot, |s| s.locals_mark);
        let frame = self.snapshot(mark);
        if let Some(state) = self.labels.get_mut(&label) {
            if state.frame.is_none() {
                state.frame = Some(frame);
            }
        }
    }

    pub fn bind(&mut self, label: Label) {
        if self.reachable {
            self.record_frame(label);
        }
        let Some(state) = self.labels.get_mut(&label) else {
            return;
        };
        state.bound = true;
        match state.frame.clone() {
            Some(frame) => {
                self.locals = frame.locals;
                while self.locals.last() == Some(&VType::Top) {
                    self.locals.pop();
                }
                self.stack_words = frame.stack.iter().map(VType::size).sum();
                self.stack = frame.stack;
                self.reachable = true;
                self.insns.push(Insn::Label(label));
                self.frame_order.push(label);
            }
            None => {
                // Nothing jumps here and control cannot fall in.
                self.reachable = false;
            }
        }
    }

    fn push(&mut self, vt: VType) {
        self.stack_words += vt.size();
        self.max_stack = self.max_stack.max(self.stack_words);
        self.stack.push(vt);
    }

    fn pop(&mut self) -> Option<VType> {
        let vt = self.stack.pop()?;
        self.stack_words -= vt.size();
        Some(vt)
    }

    fn pop_n(&mut self, n: usize) {
        for _ in 0..n {
            self.pop();
        }
    }

    fn emit(&mut self, insn: Insn) -> bool {
        if self.reachable {
            self.insns.push(insn);
        }
        self.reachable
    }

    pub fn aconst_null(&mut self) {
        if self.emit(Insn::Op(op::ACONST_NULL)) {
            self.push(VType::Null);
        }
    }

    pub fn push_int(&mut self, value: i32) {
        if self.emit(Insn::PushInt(value)) {
            self.push(VType::Integer);
        }
    }

    pub fn ldc(&mut self, constant: Constant) {
        let vt = match &constant {
            Constant::Int(_) => VType::Integer,
            Constant::Long(_) => VType::Long,
            Constant::Float(_) => VType::Float,
            Constant::Double(_) => VType::Double,
            Constant::String(_) => VType::Object(super::jvm::STRING.to_string()),
        };
        if self.emit(Insn::Ldc(constant)) {
            self.push(vt);
        }
    }

    pub fn load(&mut self, ty: &JvmType, slot: u16) {
        let op = match ty {
            JvmType::Int | JvmType::Bool | JvmType::Char => op::ILOAD,
            JvmType::Long => op::LLOAD,
            JvmType::Float => op::FLOAD,
            JvmType::Double => op::DLOAD,
            JvmType::Reference(_) | JvmType::Null | JvmType::Void => op::ALOAD,
        };
        let vt = self.locals.get(slot as usize).cloned().unwrap_or_else(|| ty.vtype());
        if self.emit(Insn::Local { op, slot }) {
            self.push(vt);
        }
    }

    pub fn store(&mut self, ty: &JvmType, slot: u16) {
        let op = match ty {
            JvmType::Int | JvmType::Bool | JvmType::Char => op::ISTORE,
            JvmType::Long => op::LSTORE,
            JvmType::Float => op::FSTORE,
            JvmType::Double => op::DSTORE,
            JvmType::Reference(_) | JvmType::Null | JvmType::Void => op::ASTORE,
        };
        if self.emit(Insn::Local { op, slot }) {
            self.pop();
            self.set_local(slot, ty.vtype());
        }
    }

    /// Operand-only instruction: pops `pops` entries, then pushes `result`.
    pub fn op(&mut self, opcode: u8, pops: usize, result: Option<VType>) {
        if self.emit(Insn::Op(opcode)) {
            self.pop_n(pops);
            if let Some(vt) = result {
                self.push(vt);
            }
        }
    }

    pub fn dup(&mut self) {
        if let Some(top) = self.stack.last().cloned() {
            if self.emit(Insn::Op(op::DUP)) {
                self.push(top);
            }
        }
    }

    /// Discard a value of type `ty` from the stack.
    pub fn discard(&mut self, ty: &JvmType) {
        match ty.size() {
            0 => {}
            1 => self.op(op::POP, 1, None),
            _ => self.op(op::POP2, 1, None),
        }
    }

    pub fn get_field(&mut self, owner: &str, name: &str, ty: &JvmType, is_static: bool) {
        let op = if is_static { op::GETSTATIC } else { op::GETFIELD };
        let insn = Insn::Field { op, owner: owner.into(), name: name.into(), descriptor: ty.descriptor() };
        if self.emit(insn) {
            if !is_static {
                self.pop();
            }
            self.push(ty.vtype());
        }
    }

    pub fn put_field(&mut self, owner: &str, name: &str, ty: &JvmType, is_static: bool) {
        let op = if is_static { op::PUTSTATIC } else { op::PUTFIELD };
        let insn = Insn::Field { op, owner: owner.into(), name: name.into(), descriptor: ty.descriptor() };
        if self.emit(insn) {
            self.pop_n(if is_static { 1 } else { 2 });
        }
    }

    /// Any invoke instruction. Pops arguments (and the receiver unless
    /// `invokestatic`) and pushes the return value. A constructor call
    /// initializes every copy of its receiver on the stack and in locals.
    pub fn invoke(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        let (params, ret) = parse_method_descriptor(descriptor).unwrap_or((Vec::new(), JvmType::Void));
        let insn = Insn::Invoke { op: opcode, owner: owner.into(), name: name.into(), descriptor: descriptor.into() };
        if !self.emit(insn) {
            return;
        }
        self.pop_n(params.len());
        if opcode != op::INVOKESTATIC {
            let receiver = self.pop();
            if name == "<init>" {
                if let Some(uninit @ (VType::Uninitialized(_) | VType::UninitializedThis)) = receiver {
                    let init = match (&uninit, &self.this_class) {
                        (VType::UninitializedThis, Some(this)) => VType::Object(this.clone()),
                        _ => VType::Object(owner.to_string()),
                    };
                    for slot in self.stack.iter_mut().chain(self.locals.iter_mut()) {
                        if *slot == uninit {
                            *slot = init.clone();
                        }
                    }
                }
            }
        }
        if ret != JvmType::Void {
            self.push(ret.vtype());
        }
    }

    /// `new class`, preceded by the label its uninitialized type refers to.
    pub fn new_object(&mut self, class: &str) {
        if !self.reachable {
            return;
        }
        let label = self.new_label();
        self.insns.push(Insn::Label(label));
        if let Some(state) = self.labels.get_mut(&label) {
            state.bound = true;
        }
        self.insns.push(Insn::Type { op: op::NEW, class: class.into() });
        self.push(VType::Uninitialized(label));
    }

    pub fn jump(&mut self, opcode: u8, target: Label) {
        let pops = match opcode {
            op::GOTO => 0,
            op::IFEQ..=op::IFLE => 1,
            _ => 2,
        };
        if !self.emit(Insn::Jump { op: opcode, target }) {
            return;
        }
        self.pop_n(pops);
        self.record_frame(target);
        if opcode == op::GOTO {
            self.reachable = false;
        }
    }

    /// `xreturn` for `ty`, or `return` for void.
    pub fn ret(&mut self, ty: &JvmType) {
        let opcode = match ty {
            JvmType::Void => op::RETURN,
            JvmType::Int | JvmType::Bool | JvmType::Char => op::IRETURN,
            JvmType::Long => op::LRETURN,
            JvmType::Float => op::FRETURN,
            JvmType::Double => op::DRETURN,
            JvmType::Reference(_) | JvmType::Null => op::ARETURN,
        };
        if self.emit(Insn::Op(opcode)) {
            self.stack.clear();
            self.stack_words = 0;
            self.reachable = false;
        }
    }

    pub fn athrow(&mut self) {
        if self.emit(Insn::Op(op::ATHROW)) {
            self.stack.clear();
            self.stack_words = 0;
            self.reachable = false;
        }
    }

    /// `throw new <class>(message)`.
    pub fn throw_new(&mut self, class: &str, message: &str) {
        self.new_object(class);
        self.dup();
        self.ldc(Constant::String(message.to_string()));
        self.invoke(op::INVOKESPECIAL, class, "<init>", "(Ljava/lang/String;)V");
        self.athrow();
    }

    pub fn finish(self) -> Code {
        let mut frames = Vec::new();
        for label in &self.frame_order {
            if let Some(frame) = self.labels.get(label).and_then(|s| s.frame.clone()) {
                frames.push((*label, frame));
            }
        }
        Code { max_stack: self.max_stack, max_locals: self.max_locals, insns: self.insns, frames }
    }

    /// Labels that were jumped to but never bound. Non-empty means a lowering bug.
    pub fn unbound_targets(&self) -> Vec<Label> {
        let mut out: Vec<Label> = self
            .labels
            .iter()
            .filter(|(_, s)| s.frame.is_some() && !s.bound)
            .map(|(l, _)| *l)
            .collect();
        out.sort();
        out
    }
}
