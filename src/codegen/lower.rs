//! Method-body lowering.
//!
//! Bodies are lowered on a best-effort basis: a construct outside the
//! supported subset aborts the body with [`Bail::Unsupported`], and the method
//! is emitted as a stub that throws `UnsupportedOperationException`. Fatal
//! conditions (types the table cannot map, call arity mismatches) abort the
//! whole unit.

use std::collections::HashMap;

use crate::ast::{BinOp, Block, Expr, Function, Literal, Stmt, UnaryOp};
use crate::diagnostics::CompileError;
use crate::span::Spanned;

use super::code::{op, Code, CodeBuilder, Constant, Label, VType};
use super::jvm::{method_descriptor, JvmType, TypeMapper, OBJECT, STRING};

pub(crate) const UNSUPPORTED: &str = "java/lang/UnsupportedOperationException";
pub(crate) const ILLEGAL_STATE: &str = "java/lang/IllegalStateException";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signature {
    pub params: Vec<JvmType>,
    pub ret: JvmType,
}

impl Signature {
    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.ret)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MethodInfo {
    pub sig: Signature,
    pub private: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldInfo {
    pub name: String,
    pub ty: JvmType,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassInfo {
    pub internal_name: String,
    pub superclass: String,
    pub fields: Vec<FieldInfo>,
    /// Declared methods and synthesized accessors by name, overloads in
    /// declaration order.
    pub methods: HashMap<String, Vec<MethodInfo>>,
}

impl ClassInfo {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn overloads(&self, name: &str) -> &[MethodInfo] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Everything body lowering needs to know about the rest of the unit.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnitInfo {
    pub facade: String,
    pub functions: HashMap<String, Signature>,
    /// By simple name.
    pub classes: HashMap<String, ClassInfo>,
}

impl UnitInfo {
    fn class_by_internal(&self, internal: &str) -> Option<&ClassInfo> {
        self.classes.values().find(|c| c.internal_name == internal)
    }

    /// Fields of the unit classes `class` extends, root first. These are the
    /// arguments its constructor hands to the superclass constructor.
    pub fn inherited_fields<'s>(&'s self, class: &'s ClassInfo) -> Vec<&'s FieldInfo> {
        let mut ancestors: Vec<&ClassInfo> = Vec::new();
        let mut current = class;
        while let Some(parent) = self.class_by_internal(&current.superclass) {
            if parent.internal_name == class.internal_name || ancestors.iter().any(|a| a.internal_name == parent.internal_name) {
                break;
            }
            ancestors.push(parent);
            current = parent;
        }
        ancestors.iter().rev().flat_map(|c| c.fields.iter()).collect()
    }

    /// Inherited fields, then the class's own, in constructor parameter order.
    pub fn constructor_fields<'s>(&'s self, class: &'s ClassInfo) -> Vec<&'s FieldInfo> {
        let mut fields = self.inherited_fields(class);
        fields.extend(&class.fields);
        fields
    }

    pub fn constructor_signature(&self, class: &ClassInfo) -> Signature {
        fields_signature(&self.constructor_fields(class))
    }
}

fn fields_signature(fields: &[&FieldInfo]) -> Signature {
    Signature { params: fields.iter().map(|f| f.ty.clone()).collect(), ret: JvmType::Void }
}

/// Why a body could not be lowered.
#[derive(Debug)]
enum Bail {
    Unsupported(String),
    Fatal(CompileError),
}

impl From<CompileError> for Bail {
    fn from(err: CompileError) -> Self {
        Bail::Fatal(err)
    }
}

type LowerResult<T> = Result<T, Bail>;

fn unsupported<T>(reason: impl Into<String>) -> LowerResult<T> {
    Err(Bail::Unsupported(reason.into()))
}

#[derive(Debug, Clone)]
struct Local {
    slot: u16,
    ty: JvmType,
}

/// A lowered body and, for stubs, the construct that forced the stub.
#[derive(Debug)]
pub(crate) struct LoweredBody {
    pub code: Code,
    pub stub_reason: Option<String>,
}

struct LowerContext<'a> {
    code: CodeBuilder,
    unit: &'a UnitInfo,
    owner: Option<&'a ClassInfo>,
    mapper: &'a TypeMapper<'a>,
    scopes: Vec<(HashMap<String, Local>, u16)>,
    return_type: JvmType,
    /// (continue target, break target) of enclosing loops.
    loop_stack: Vec<(Label, Label)>,
}

fn entry_locals(owner: Option<&ClassInfo>, params: &[JvmType]) -> Vec<VType> {
    let mut locals = Vec::with_capacity(params.len() + 1);
    if let Some(class) = owner {
        locals.push(VType::Object(class.internal_name.clone()));
    }
    locals.extend(params.iter().map(JvmType::vtype));
    locals
}

/// Lower the body of a top-level function (`owner == None`, static) or a method.
pub(crate) fn lower_function_body(
    func: &Function,
    sig: &Signature,
    owner: Option<&ClassInfo>,
    unit: &UnitInfo,
    mapper: &TypeMapper<'_>,
) -> Result<LoweredBody, CompileError> {
    let mut ctx = LowerContext {
        code: CodeBuilder::new(entry_locals(owner, &sig.params)),
        unit,
        owner,
        mapper,
        scopes: Vec::new(),
        return_type: sig.ret.clone(),
        loop_stack: Vec::new(),
    };
    let name = &func.name.node;
    match ctx.lower_entry(func, sig) {
        Ok(()) => Ok(LoweredBody { code: ctx.code.finish(), stub_reason: None }),
        Err(Bail::Fatal(err)) => Err(err),
        Err(Bail::Unsupported(reason)) => {
            tracing::debug!(function = %name, reason = %reason, "unsupported construct");
            let mut code = CodeBuilder::new(entry_locals(owner, &sig.params));
            code.throw_new(UNSUPPORTED, &format!("{name}: {reason}"));
            Ok(LoweredBody { code: code.finish(), stub_reason: Some(reason) })
        }
    }
}

impl<'a> LowerContext<'a> {
    fn lower_entry(&mut self, func: &Function, sig: &Signature) -> LowerResult<()> {
        let mut slot = u16::from(self.owner.is_some());
        let mut frame = HashMap::new();
        for (param, ty) in func.params.iter().zip(&sig.params) {
            frame.insert(param.name.node.clone(), Local { slot, ty: ty.clone() });
            slot += ty.size();
        }
        self.scopes.push((frame, self.code.locals_mark()));

        self.lower_stmts(&func.body.node.stmts)?;

        if self.code.is_reachable() {
            if self.return_type == JvmType::Void {
                self.code.ret(&JvmType::Void);
            } else {
                let message = format!("missing return in '{}'", func.name.node);
                self.code.throw_new(ILLEGAL_STATE, &message);
            }
        }
        let dangling = self.code.unbound_targets();
        if !dangling.is_empty() {
            return Err(Bail::Fatal(CompileError::lowering(format!(
                "'{}' jumps to {} unplaced label(s)",
                func.name.node,
                dangling.len()
            ))));
        }
        Ok(())
    }

    fn lower_stmts(&mut self, stmts: &[Spanned<Stmt>]) -> LowerResult<()> {
        for stmt in stmts {
            if !self.code.is_reachable() {
                break;
            }
            self.lower_stmt(&stmt.node)?;
        }
        Ok(())
    }

    fn lower_scoped(&mut self, block: &Spanned<Block>) -> LowerResult<()> {
        self.scopes.push((HashMap::new(), self.code.locals_mark()));
        let result = self.lower_stmts(&block.node.stmts);
        if let Some((_, mark)) = self.scopes.pop() {
            self.code.end_scope(mark);
        }
        result
    }

    /// A class of this unit by internal name.
    fn class_info(&self, internal: &str) -> Option<&'a ClassInfo> {
        let unit: &'a UnitInfo = self.unit;
        match self.owner {
            Some(owner) if owner.internal_name == internal => Some(owner),
            _ => unit.class_by_internal(internal),
        }
    }

    fn lookup_local(&self, name: &str) -> Option<&Local> {
        self.scopes.iter().rev().find_map(|(frame, _)| frame.get(name))
    }

    fn declare_local(&mut self, name: &str, ty: JvmType) -> u16 {
        let slot = self.code.allocate(ty.vtype());
        if let Some((frame, _)) = self.scopes.last_mut() {
            frame.insert(name.to_string(), Local { slot, ty });
        }
        slot
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> LowerResult<()> {
        match stmt {
            Stmt::Let { name, ty, value } => {
                let value_ty = self.lower_expr(&value.node)?;
                let local_ty = match ty {
                    Some(declared) => {
                        let declared = self.mapper.map(declared)?;
                        self.check_assignable(&value_ty, &declared, &format!("'{}'", name.node))?;
                        declared
                    }
                    None => match value_ty {
                        JvmType::Void => return unsupported(format!("binding the Void result to '{}'", name.node)),
                        JvmType::Null => JvmType::object(),
                        other => other,
                    },
                };
                let slot = self.declare_local(&name.node, local_ty.clone());
                self.code.store(&local_ty, slot);
                Ok(())
            }
            Stmt::Assign { target, value } => self.lower_assign(&target.node, &value.node),
            Stmt::Return(value) => {
                let ret = self.return_type.clone();
                match value {
                    Some(expr) => {
                        let ty = self.lower_expr(&expr.node)?;
                        if ret == JvmType::Void {
                            return unsupported("returning a value from a Void function");
                        }
                        self.check_assignable(&ty, &ret, "the return value")?;
                        self.code.ret(&ret);
                    }
                    None if ret == JvmType::Void => self.code.ret(&JvmType::Void),
                    None => return unsupported("return without a value in a non-Void function"),
                }
                Ok(())
            }
            Stmt::If { condition, then_block, else_block } => {
                let end = self.code.new_label();
                match else_block {
                    Some(else_block) => {
                        let otherwise = self.code.new_label();
                        self.branch(&condition.node, otherwise, false)?;
                        self.lower_scoped(then_block)?;
                        self.code.jump(op::GOTO, end);
                        self.code.bind(otherwise);
                        self.lower_scoped(else_block)?;
                    }
                    None => {
                        self.branch(&condition.node, end, false)?;
                        self.lower_scoped(then_block)?;
                    }
                }
                self.code.bind(end);
                Ok(())
            }
            Stmt::While { condition, body } => {
                let header = self.code.new_label();
                let exit = self.code.new_label();
                self.code.bind(header);
                self.branch(&condition.node, exit, false)?;
                self.loop_stack.push((header, exit));
                let result = self.lower_scoped(body);
                self.loop_stack.pop();
                result?;
                self.code.jump(op::GOTO, header);
                self.code.bind(exit);
                Ok(())
            }
            Stmt::For { .. } => unsupported("for loops"),
            Stmt::Break => {
                let Some(&(_, exit)) = self.loop_stack.last() else {
                    return unsupported("break outside of a loop");
                };
                self.code.jump(op::GOTO, exit);
                Ok(())
            }
            Stmt::Continue => {
                let Some(&(header, _)) = self.loop_stack.last() else {
                    return unsupported("continue outside of a loop");
                };
                self.code.jump(op::GOTO, header);
                Ok(())
            }
            Stmt::Block(block) => self.lower_scoped(block),
            Stmt::Expr(expr) => {
                let ty = self.lower_expr(&expr.node)?;
                self.code.discard(&ty);
                Ok(())
            }
        }
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> LowerResult<()> {
        match target {
            Expr::Ident(name) => {
                if let Some(local) = self.lookup_local(name).cloned() {
                    let ty = self.lower_expr(value)?;
                    self.check_assignable(&ty, &local.ty, &format!("'{name}'"))?;
                    self.code.store(&local.ty, local.slot);
                    return Ok(());
                }
                self.assign_own_field(name, value)
            }
            Expr::FieldAccess { object, field } if matches!(object.node, Expr::This) => {
                self.assign_own_field(&field.node, value)
            }
            _ => unsupported("assignment to this kind of target"),
        }
    }

    fn assign_own_field(&mut self, name: &str, value: &Expr) -> LowerResult<()> {
        let Some(owner) = self.owner else {
            return unsupported(format!("assignment to unknown variable '{name}'"));
        };
        let Some(field) = owner.field(name) else {
            return unsupported(format!("assignment to unknown variable '{name}'"));
        };
        if !field.mutable {
            return unsupported(format!("assignment to immutable field '{name}'"));
        }
        self.code.load(&JvmType::Reference(owner.internal_name.clone()), 0);
        let ty = self.lower_expr(value)?;
        self.check_assignable(&ty, &field.ty, &format!("field '{name}'"))?;
        self.code.put_field(&owner.internal_name, name, &field.ty, false);
        Ok(())
    }

    fn check_assignable(&self, value: &JvmType, target: &JvmType, what: &str) -> LowerResult<()> {
        if value.assignable_to(target) {
            Ok(())
        } else {
            unsupported(format!("{} value for {what} of type {}", value.descriptor(), target.descriptor()))
        }
    }

    /// Lower `expr` and return the JVM type of the value it leaves on the stack.
    fn lower_expr(&mut self, expr: &Expr) -> LowerResult<JvmType> {
        match expr {
            Expr::Literal(lit) => Ok(self.lower_literal(lit)),
            Expr::Ident(name) => {
                if let Some(local) = self.lookup_local(name).cloned() {
                    self.code.load(&local.ty, local.slot);
                    return Ok(local.ty);
                }
                if let Some((owner, field)) = self.owner.and_then(|o| o.field(name).map(|f| (o, f))) {
                    self.code.load(&JvmType::Reference(owner.internal_name.clone()), 0);
                    self.code.get_field(&owner.internal_name, name, &field.ty, false);
                    return Ok(field.ty.clone());
                }
                unsupported(format!("reference to '{name}' as a value"))
            }
            Expr::This => match self.owner {
                Some(owner) => {
                    let ty = JvmType::Reference(owner.internal_name.clone());
                    self.code.load(&ty, 0);
                    Ok(ty)
                }
                None => unsupported("'this' outside of a class"),
            },
            Expr::Binary { op: bin, .. } if bin.is_comparison() || bin.is_logical() => {
                self.materialize_condition(expr)
            }
            Expr::Binary { op: bin, lhs, rhs } => {
                let left = self.lower_expr(&lhs.node)?;
                let right = self.lower_expr(&rhs.node)?;
                self.lower_arithmetic(*bin, &left, &right)
            }
            Expr::Unary { op: UnaryOp::Not, .. } => self.materialize_condition(expr),
            Expr::Unary { op: UnaryOp::Neg, operand } => {
                let ty = self.lower_expr(&operand.node)?;
                let Some(offset) = numeric_offset(&ty) else {
                    return unsupported(format!("negation of {}", ty.descriptor()));
                };
                self.code.op(op::INEG + offset, 1, Some(ty.vtype()));
                Ok(ty)
            }
            Expr::Call { name, args } => self.lower_call(&name.node, args),
            Expr::MethodCall { object, method, args } => {
                let receiver = self.lower_expr(&object.node)?;
                let JvmType::Reference(internal) = &receiver else {
                    return unsupported(format!("method call on {}", receiver.descriptor()));
                };
                let Some(class) = self.class_info(internal) else {
                    return unsupported(format!("method call on external type {internal}"));
                };
                let overloads = class.overloads(&method.node);
                if overloads.is_empty() {
                    return unsupported(format!("unknown method '{}' on {}", method.node, internal));
                }
                let info = self.lower_overloaded_args(&format!("{}.{}", internal, method.node), args, overloads)?;
                let opcode = if info.private { op::INVOKESPECIAL } else { op::INVOKEVIRTUAL };
                self.code.invoke(opcode, &class.internal_name, &method.node, &info.sig.descriptor());
                Ok(info.sig.ret.clone())
            }
            Expr::FieldAccess { object, field } => {
                let receiver = self.lower_expr(&object.node)?;
                let JvmType::Reference(internal) = &receiver else {
                    return unsupported(format!("field access on {}", receiver.descriptor()));
                };
                let Some(class) = self.class_info(internal) else {
                    return unsupported(format!("field access on external type {internal}"));
                };
                let Some(info) = class.field(&field.node) else {
                    return unsupported(format!("unknown field '{}' on {}", field.node, internal));
                };
                let own = self.owner.is_some_and(|o| o.internal_name == class.internal_name);
                if own {
                    self.code.get_field(&class.internal_name, &field.node, &info.ty, false);
                } else {
                    let getter = accessor_name(&field.node);
                    let desc = method_descriptor(&[], &info.ty);
                    self.code.invoke(op::INVOKEVIRTUAL, &class.internal_name, &getter, &desc);
                }
                Ok(info.ty.clone())
            }
            Expr::Index { .. } => unsupported("index expressions"),
            Expr::Tuple(_) => unsupported("tuple expressions"),
            Expr::ListLit(_) => unsupported("list literals"),
            Expr::Lambda { .. } => unsupported("lambda expressions"),
            Expr::Match { .. } => unsupported("match expressions"),
        }
    }

    fn lower_literal(&mut self, lit: &Literal) -> JvmType {
        match lit {
            Literal::Int(v) => {
                self.code.push_int(*v);
                JvmType::Int
            }
            Literal::Long(v) => {
                self.code.ldc(Constant::Long(*v));
                JvmType::Long
            }
            Literal::Float(v) => {
                self.code.ldc(Constant::Float(*v));
                JvmType::Float
            }
            Literal::Double(v) => {
                self.code.ldc(Constant::Double(*v));
                JvmType::Double
            }
            Literal::String(s) => {
                self.code.ldc(Constant::String(s.clone()));
                JvmType::string()
            }
            Literal::Bool(b) => {
                self.code.push_int(i32::from(*b));
                JvmType::Bool
            }
            Literal::Char(c) => {
                self.code.push_int(*c as i32);
                JvmType::Char
            }
            Literal::Null => {
                self.code.aconst_null();
                JvmType::Null
            }
        }
    }

    fn lower_arithmetic(&mut self, bin: BinOp, left: &JvmType, right: &JvmType) -> LowerResult<JvmType> {
        if bin == BinOp::Add && left.is_string() && right.is_string() {
            self.code.invoke(op::INVOKEVIRTUAL, STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;");
            return Ok(JvmType::string());
        }
        let base = match bin {
            BinOp::Add => op::IADD,
            BinOp::Sub => op::ISUB,
            BinOp::Mul => op::IMUL,
            BinOp::Div => op::IDIV,
            BinOp::Mod => op::IREM,
            _ => return unsupported(format!("operator {bin:?} in arithmetic position")),
        };
        match numeric_offset(left) {
            Some(offset) if left == right => {
                self.code.op(base + offset, 2, Some(left.vtype()));
                Ok(left.clone())
            }
            _ => unsupported(format!("operator {bin:?} on {} and {}", left.descriptor(), right.descriptor())),
        }
    }

    /// Turn a condition into a 0/1 `Bool` on the stack.
    fn materialize_condition(&mut self, expr: &Expr) -> LowerResult<JvmType> {
        let when_false = self.code.new_label();
        let end = self.code.new_label();
        self.branch(expr, when_false, false)?;
        self.code.push_int(1);
        self.code.jump(op::GOTO, end);
        self.code.bind(when_false);
        self.code.push_int(0);
        self.code.bind(end);
        Ok(JvmType::Bool)
    }

    /// Jump to `target` when `cond` evaluates to `when`; fall through otherwise.
    fn branch(&mut self, cond: &Expr, target: Label, when: bool) -> LowerResult<()> {
        match cond {
            Expr::Literal(Literal::Bool(b)) => {
                if *b == when {
                    self.code.jump(op::GOTO, target);
                }
                Ok(())
            }
            Expr::Unary { op: UnaryOp::Not, operand } => self.branch(&operand.node, target, !when),
            Expr::Binary { op: BinOp::And, lhs, rhs } => {
                if when {
                    let skip = self.code.new_label();
                    self.branch(&lhs.node, skip, false)?;
                    self.branch(&rhs.node, target, true)?;
                    self.code.bind(skip);
                } else {
                    self.branch(&lhs.node, target, false)?;
                    self.branch(&rhs.node, target, false)?;
                }
                Ok(())
            }
            Expr::Binary { op: BinOp::Or, lhs, rhs } => {
                if when {
                    self.branch(&lhs.node, target, true)?;
                    self.branch(&rhs.node, target, true)?;
                } else {
                    let skip = self.code.new_label();
                    self.branch(&lhs.node, skip, true)?;
                    self.branch(&rhs.node, target, false)?;
                    self.code.bind(skip);
                }
                Ok(())
            }
            Expr::Binary { op: bin, lhs, rhs } if bin.is_comparison() => {
                let left = self.lower_expr(&lhs.node)?;
                let right = self.lower_expr(&rhs.node)?;
                self.compare_and_jump(*bin, &left, &right, target, when)
            }
            other => {
                let ty = self.lower_expr(other)?;
                if ty != JvmType::Bool {
                    return unsupported(format!("condition of type {}", ty.descriptor()));
                }
                self.code.jump(if when { op::IFNE } else { op::IFEQ }, target);
                Ok(())
            }
        }
    }

    fn compare_and_jump(&mut self, bin: BinOp, left: &JvmType, right: &JvmType, target: Label, when: bool) -> LowerResult<()> {
        let cond = if when { bin } else { negate(bin) };
        let int_like = |t: &JvmType| matches!(t, JvmType::Int | JvmType::Bool | JvmType::Char);
        if int_like(left) && int_like(right) {
            self.code.jump(condition_opcode(cond) + 6, target);
            return Ok(());
        }
        if left.is_reference() && right.is_reference() {
            if !matches!(bin, BinOp::Eq | BinOp::Neq) {
                return unsupported(format!("ordering comparison of {} and {}", left.descriptor(), right.descriptor()));
            }
            let desc = format!("(L{OBJECT};L{OBJECT};)Z");
            self.code.invoke(op::INVOKESTATIC, "java/util/Objects", "equals", &desc);
            let equal_when = (bin == BinOp::Eq) == when;
            self.code.jump(if equal_when { op::IFNE } else { op::IFEQ }, target);
            return Ok(());
        }
        if left != right {
            return unsupported(format!("comparison of {} and {}", left.descriptor(), right.descriptor()));
        }
        let compare = match left {
            JvmType::Long => op::LCMP,
            // NaN must make `<` and `<=` false, so those use the "g" variant.
            JvmType::Float if matches!(bin, BinOp::Lt | BinOp::LtEq) => op::FCMPG,
            JvmType::Float => op::FCMPL,
            JvmType::Double if matches!(bin, BinOp::Lt | BinOp::LtEq) => op::DCMPG,
            JvmType::Double => op::DCMPL,
            other => return unsupported(format!("comparison of {}", other.descriptor())),
        };
        self.code.op(compare, 2, Some(VType::Integer));
        self.code.jump(condition_opcode(cond), target);
        Ok(())
    }

    fn lower_call(&mut self, name: &str, args: &[Spanned<Expr>]) -> LowerResult<JvmType> {
        let unit = self.unit;
        if let Some(class) = unit.classes.get(name) {
            let sig = unit.constructor_signature(class);
            self.code.new_object(&class.internal_name);
            self.code.dup();
            self.lower_args(name, args, &sig.params)?;
            self.code.invoke(op::INVOKESPECIAL, &class.internal_name, "<init>", &sig.descriptor());
            return Ok(JvmType::Reference(class.internal_name.clone()));
        }
        if let Some(owner) = self.owner.filter(|o| !o.overloads(name).is_empty()) {
            self.code.load(&JvmType::Reference(owner.internal_name.clone()), 0);
            let info = self.lower_overloaded_args(name, args, owner.overloads(name))?;
            let opcode = if info.private { op::INVOKESPECIAL } else { op::INVOKEVIRTUAL };
            self.code.invoke(opcode, &owner.internal_name, name, &info.sig.descriptor());
            return Ok(info.sig.ret.clone());
        }
        if let Some(sig) = unit.functions.get(name) {
            self.lower_args(name, args, &sig.params)?;
            self.code.invoke(op::INVOKESTATIC, &unit.facade, name, &sig.descriptor());
            return Ok(sig.ret.clone());
        }
        unsupported(format!("call to '{name}'"))
    }

    /// Lower `args` for whichever overload accepts them: an exact match first,
    /// then the first declared overload every argument is assignable to.
    fn lower_overloaded_args<'m>(
        &mut self,
        callee: &str,
        args: &[Spanned<Expr>],
        overloads: &'m [MethodInfo],
    ) -> LowerResult<&'m MethodInfo> {
        let candidates: Vec<&MethodInfo> = overloads.iter().filter(|m| m.sig.params.len() == args.len()).collect();
        match candidates.as_slice() {
            [] => {
                let mut arities: Vec<usize> = overloads.iter().map(|m| m.sig.params.len()).collect();
                arities.sort_unstable();
                arities.dedup();
                let expected = arities.iter().map(usize::to_string).collect::<Vec<_>>().join(" or ");
                Err(Bail::Fatal(CompileError::lowering(format!(
                    "'{callee}' takes {expected} argument(s) but {} were supplied",
                    args.len()
                ))))
            }
            [only] => {
                self.lower_args(callee, args, &only.sig.params)?;
                Ok(*only)
            }
            _ => {
                let mut types = Vec::with_capacity(args.len());
                for arg in args {
                    types.push(self.lower_expr(&arg.node)?);
                }
                let exact = candidates.iter().find(|m| m.sig.params == types);
                let assignable = || candidates.iter().find(|m| types.iter().zip(&m.sig.params).all(|(t, p)| t.assignable_to(p)));
                match exact.or_else(assignable) {
                    Some(found) => Ok(*found),
                    None => {
                        let supplied = types.iter().map(JvmType::descriptor).collect::<String>();
                        unsupported(format!("no overload of '{callee}' accepts ({supplied})"))
                    }
                }
            }
        }
    }

    fn lower_args(&mut self, callee: &str, args: &[Spanned<Expr>], params: &[JvmType]) -> LowerResult<()> {
        if args.len() != params.len() {
            return Err(Bail::Fatal(CompileError::lowering(format!(
                "'{callee}' takes {} argument(s) but {} were supplied",
                params.len(),
                args.len()
            ))));
        }
        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let ty = self.lower_expr(&arg.node)?;
            self.check_assignable(&ty, param, &format!("argument {} of '{callee}'", i + 1))?;
        }
        Ok(())
    }
}

fn numeric_offset(ty: &JvmType) -> Option<u8> {
    match ty {
        JvmType::Int => Some(0),
        JvmType::Long => Some(1),
        JvmType::Float => Some(2),
        JvmType::Double => Some(3),
        _ => None,
    }
}

fn negate(bin: BinOp) -> BinOp {
    match bin {
        BinOp::Eq => BinOp::Neq,
        BinOp::Neq => BinOp::Eq,
        BinOp::Lt => BinOp::GtEq,
        BinOp::GtEq => BinOp::Lt,
        BinOp::Gt => BinOp::LtEq,
        BinOp::LtEq => BinOp::Gt,
        other => other,
    }
}

/// Single-operand `if<cond>` opcode; the two-operand `if_icmp<cond>` is six higher.
fn condition_opcode(bin: BinOp) -> u8 {
    match bin {
        BinOp::Eq => op::IFEQ,
        BinOp::Neq => op::IFNE,
        BinOp::Lt => op::IFLT,
        BinOp::GtEq => op::IFGE,
        BinOp::Gt => op::IFGT,
        _ => op::IFLE,
    }
}

pub(crate) fn accessor_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("get{}{}", first.to_uppercase(), chars.as_str()),
        None => "get".to_string(),
    }
}

/// `this(inherited..., own...)`: the superclass constructor receives the
/// inherited fields (none for external superclasses), then every own field is
/// assigned in declaration order.
pub(crate) fn constructor_code(class: &ClassInfo, unit: &UnitInfo) -> Code {
    let this = JvmType::Reference(class.internal_name.clone());
    let inherited = unit.inherited_fields(class);
    let mut locals = vec![VType::UninitializedThis];
    locals.extend(inherited.iter().copied().chain(&class.fields).map(|f| f.ty.vtype()));
    let mut code = CodeBuilder::new(locals).with_this_class(&class.internal_name);
    code.load(&this, 0);
    let mut slot = 1u16;
    for field in &inherited {
        code.load(&field.ty, slot);
        slot += field.ty.size();
    }
    code.invoke(op::INVOKESPECIAL, &class.superclass, "<init>", &fields_signature(&inherited).descriptor());
    for field in &class.fields {
        code.load(&this, 0);
        code.load(&field.ty, slot);
        code.put_field(&class.internal_name, &field.name, &field.ty, false);
        slot += field.ty.size();
    }
    code.ret(&JvmType::Void);
    code.finish()
}

pub(crate) fn accessor_code(class: &ClassInfo, field: &FieldInfo) -> Code {
    let this = JvmType::Reference(class.internal_name.clone());
    let mut code = CodeBuilder::new(vec![this.vtype()]);
    code.load(&this, 0);
    code.get_field(&class.internal_name, &field.name, &field.ty, false);
    code.ret(&field.ty);
    code.finish()
}

/// `main(String[])` calling the unit's zero-argument `main`.
pub(crate) fn entry_bridge_code(facade: &str, target: &Signature) -> Code {
    let mut code = CodeBuilder::new(vec![VType::Object("[Ljava/lang/String;".into())]);
    code.invoke(op::INVOKESTATIC, facade, "main", &target.descriptor());
    code.discard(&target.ret);
    code.ret(&JvmType::Void);
    code.finish()
}
