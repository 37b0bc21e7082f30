//! Syntax tree handed over by the external parser.
//!
//! Every node that can carry a diagnostic is wrapped in [`Spanned`]. The
//! builder methods produce dummy spans; callers that need real positions
//! construct `Spanned::new(node, span)` directly.

use std::path::Path;

use crate::span::{Span, Spanned};
use crate::typeck::types::Type;

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Path of the source file, used for diagnostics and the facade class name.
    pub path: String,
    pub source: String,
    pub module: Option<Spanned<ModulePath>>,
    pub imports: Vec<Spanned<ImportDecl>>,
    pub declarations: Vec<Spanned<Decl>>,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            module: None,
            imports: Vec::new(),
            declarations: Vec::new(),
        }
    }

    pub fn with_module(mut self, dotted: &str) -> Self {
        self.module = Some(Spanned::dummy(ModulePath::parse(dotted)));
        self
    }

    pub fn with_import(mut self, import: ImportDecl) -> Self {
        self.imports.push(Spanned::dummy(import));
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.declarations.push(Spanned::dummy(Decl::Function(function)));
        self
    }

    pub fn with_class(mut self, class: ClassDecl) -> Self {
        self.declarations.push(Spanned::dummy(Decl::Class(class)));
        self
    }

    /// Dotted package of the unit's classes: its module, or `default_module`.
    pub fn package(&self, default_module: &str) -> String {
        match &self.module {
            Some(m) if !m.node.0.is_empty() => m.node.dotted(),
            _ => default_module.to_string(),
        }
    }

    /// File name without directories or extension.
    pub fn file_stem(&self) -> &str {
        Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.path)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Spanned<Decl>> {
        self.declarations.iter().filter(|d| matches!(d.node, Decl::Function(_)))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.declarations.iter().filter_map(|d| match &d.node {
            Decl::Class(c) => Some(c),
            Decl::Function(_) => None,
        })
    }
}

/// Dotted module path, e.g. `com.example`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').filter(|s| !s.is_empty()).map(str::to_string).collect())
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: Vec<Spanned<String>>,
    /// `import java.util.*`: `path` names the package.
    pub wildcard: bool,
    pub alias: Option<Spanned<String>>,
}

impl ImportDecl {
    pub fn single(dotted: &str) -> Self {
        Self { path: dummy_segments(dotted), wildcard: false, alias: None }
    }

    pub fn wildcard(package: &str) -> Self {
        Self { path: dummy_segments(package), wildcard: true, alias: None }
    }

    pub fn aliased(dotted: &str, alias: &str) -> Self {
        Self { path: dummy_segments(dotted), wildcard: false, alias: Some(Spanned::dummy(alias.to_string())) }
    }

    /// Local name the import introduces. Wildcards introduce none.
    pub fn binding_name(&self) -> Option<&str> {
        if self.wildcard {
            return None;
        }
        match &self.alias {
            Some(alias) => Some(&alias.node),
            None => self.path.last().map(|s| s.node.as_str()),
        }
    }

    pub fn full_path(&self) -> String {
        self.path.iter().map(|s| s.node.as_str()).collect::<Vec<_>>().join(".")
    }
}

fn dummy_segments(dotted: &str) -> Vec<Spanned<String>> {
    dotted.split('.').map(|s| Spanned::dummy(s.to_string())).collect()
}

#[derive(Debug, Clone)]
pub enum Decl {
    Function(Function),
    Class(ClassDecl),
}

impl Decl {
    pub fn name(&self) -> &Spanned<String> {
        match self {
            Decl::Function(f) => &f.name,
            Decl::Class(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Internal,
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: Spanned<String>,
    pub bounds: Vec<Type>,
}

impl TypeParam {
    pub fn new(name: &str, bounds: Vec<Type>) -> Self {
        Self { name: Spanned::dummy(name.to_string()), bounds }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<Field>,
    pub methods: Vec<Spanned<Function>>,
    pub annotations: Vec<Annotation>,
    pub visibility: Visibility,
}

impl ClassDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: Spanned::dummy(name.to_string()),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    pub fn field(mut self, name: &str, ty: Type) -> Self {
        self.fields.push(Field::new(name, ty));
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, function: Function) -> Self {
        self.methods.push(Spanned::dummy(function));
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn extends(mut self, superclass: Type) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn type_param(mut self, param: TypeParam) -> Self {
        self.type_params.push(param);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Spanned<String>,
    pub ty: Type,
    pub visibility: Visibility,
    pub mutable: bool,
    pub annotations: Vec<Annotation>,
}

impl Field {
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: Spanned::dummy(name.to_string()),
            ty,
            visibility: Visibility::Private,
            mutable: false,
            annotations: Vec::new(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    /// `None` means `Void`.
    pub return_type: Option<Type>,
    pub body: Spanned<Block>,
    pub annotations: Vec<Annotation>,
    pub visibility: Visibility,
}

impl Function {
    pub fn new(name: &str) -> Self {
        Self {
            name: Spanned::dummy(name.to_string()),
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            body: Spanned::dummy(Block::default()),
            annotations: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn body(mut self, stmts: Vec<Spanned<Stmt>>) -> Self {
        self.body = Spanned::dummy(Block { stmts });
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn type_param(mut self, param: TypeParam) -> Self {
        self.type_params.push(param);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Type,
    pub annotations: Vec<Annotation>,
}

impl Param {
    pub fn new(name: &str, ty: Type) -> Self {
        Self { name: Spanned::dummy(name.to_string()), ty, annotations: Vec::new() }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: Spanned<String>,
    pub args: Vec<AnnotationArg>,
}

impl Annotation {
    pub fn new(name: &str) -> Self {
        Self { name: Spanned::dummy(name.to_string()), args: Vec::new() }
    }

    /// Unnamed argument, i.e. the `value` attribute.
    pub fn arg(mut self, value: AnnotationValue) -> Self {
        self.args.push(AnnotationArg { name: None, value });
        self
    }

    pub fn named_arg(mut self, name: &str, value: AnnotationValue) -> Self {
        self.args.push(AnnotationArg { name: Some(Spanned::dummy(name.to_string())), value });
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationArg {
    pub name: Option<Spanned<String>>,
    pub value: AnnotationValue,
}

impl AnnotationArg {
    pub fn attribute_name(&self) -> &str {
        self.name.as_ref().map(|n| n.node.as_str()).unwrap_or("value")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    Enum { ty: String, constant: String },
    Class(String),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn string(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: Spanned<String>,
        ty: Option<Type>,
        value: Spanned<Expr>,
    },
    /// Target is an identifier or a field access.
    Assign {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    Return(Option<Spanned<Expr>>),
    If {
        condition: Spanned<Expr>,
        then_block: Spanned<Block>,
        else_block: Option<Spanned<Block>>,
    },
    While {
        condition: Spanned<Expr>,
        body: Spanned<Block>,
    },
    For {
        var: Spanned<String>,
        iterable: Spanned<Expr>,
        body: Spanned<Block>,
    },
    Break,
    Continue,
    Block(Spanned<Block>),
    Expr(Spanned<Expr>),
}

impl Stmt {
    pub fn let_(name: &str, value: Expr) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Let { name: Spanned::dummy(name.to_string()), ty: None, value: Spanned::dummy(value) })
    }

    pub fn let_typed(name: &str, ty: Type, value: Expr) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Let { name: Spanned::dummy(name.to_string()), ty: Some(ty), value: Spanned::dummy(value) })
    }

    pub fn assign(target: Expr, value: Expr) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Assign { target: Spanned::dummy(target), value: Spanned::dummy(value) })
    }

    pub fn ret(value: Expr) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Return(Some(Spanned::dummy(value))))
    }

    pub fn ret_void() -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Return(None))
    }

    pub fn expr(value: Expr) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Expr(Spanned::dummy(value)))
    }

    pub fn if_(condition: Expr, then_block: Vec<Spanned<Stmt>>, else_block: Option<Vec<Spanned<Stmt>>>) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::If {
            condition: Spanned::dummy(condition),
            then_block: Spanned::dummy(Block { stmts: then_block }),
            else_block: else_block.map(|stmts| Spanned::dummy(Block { stmts })),
        })
    }

    pub fn while_(condition: Expr, body: Vec<Spanned<Stmt>>) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::While { condition: Spanned::dummy(condition), body: Spanned::dummy(Block { stmts: body }) })
    }

    pub fn for_(var: &str, iterable: Expr, body: Vec<Spanned<Stmt>>) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::For {
            var: Spanned::dummy(var.to_string()),
            iterable: Spanned::dummy(iterable),
            body: Spanned::dummy(Block { stmts: body }),
        })
    }

    pub fn block(stmts: Vec<Spanned<Stmt>>) -> Spanned<Stmt> {
        Spanned::dummy(Stmt::Block(Spanned::dummy(Block { stmts })))
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    This,
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    /// Bare call: a top-level function, or a constructor when `name` is a type.
    Call {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    MethodCall {
        object: Box<Spanned<Expr>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    FieldAccess {
        object: Box<Spanned<Expr>>,
        field: Spanned<String>,
    },
    Index {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Tuple(Vec<Spanned<Expr>>),
    ListLit(Vec<Spanned<Expr>>),
    Lambda {
        params: Vec<Param>,
        body: Spanned<Block>,
    },
    Match {
        scrutinee: Box<Spanned<Expr>>,
        arms: Vec<MatchArm>,
    },
}

impl Expr {
    pub fn int(v: i32) -> Expr {
        Expr::Literal(Literal::Int(v))
    }

    pub fn string(s: &str) -> Expr {
        Expr::Literal(Literal::String(s.to_string()))
    }

    pub fn bool(b: bool) -> Expr {
        Expr::Literal(Literal::Bool(b))
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary { op, lhs: Box::new(Spanned::dummy(lhs)), rhs: Box::new(Spanned::dummy(rhs)) }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary { op, operand: Box::new(Spanned::dummy(operand)) }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call { name: Spanned::dummy(name.to_string()), args: args.into_iter().map(Spanned::dummy).collect() }
    }

    pub fn method(object: Expr, method: &str, args: Vec<Expr>) -> Expr {
        Expr::MethodCall {
            object: Box::new(Spanned::dummy(object)),
            method: Spanned::dummy(method.to_string()),
            args: args.into_iter().map(Spanned::dummy).collect(),
        }
    }

    pub fn field(object: Expr, field: &str) -> Expr {
        Expr::FieldAccess { object: Box::new(Spanned::dummy(object)), field: Spanned::dummy(field.to_string()) }
    }

    pub fn lambda(params: Vec<Param>, body: Vec<Spanned<Stmt>>) -> Expr {
        Expr::Lambda { params, body: Spanned::dummy(Block { stmts: body }) }
    }
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Spanned<Pattern>,
    pub body: Spanned<Block>,
}

impl MatchArm {
    pub fn new(pattern: Pattern, body: Vec<Spanned<Stmt>>) -> Self {
        Self { pattern: Spanned::dummy(pattern), body: Spanned::dummy(Block { stmts: body }) }
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    Literal(Literal),
    Binding(String),
    /// `User(id, _)`: the type name must resolve.
    Constructor {
        name: Spanned<String>,
        fields: Vec<Spanned<Pattern>>,
    },
}

impl Pattern {
    /// Names bound by this pattern, in source order.
    pub fn bindings(&self) -> Vec<(&str, Span)> {
        let mut out = Vec::new();
        self.collect_bindings(Span::dummy(), &mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, span: Span, out: &mut Vec<(&'a str, Span)>) {
        match self {
            Pattern::Wildcard | Pattern::Literal(_) => {}
            Pattern::Binding(name) => out.push((name.as_str(), span)),
            Pattern::Constructor { fields, .. } => {
                for f in fields {
                    f.node.collect_bindings(f.span, out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bool(bool),
    Char(char),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}
