use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::{Span, Spanned};
use super::env::{closest_name, SymbolKind};
use super::types::{PrimitiveKind, Type, TypeKind};
use super::Analyzer;

pub(crate) fn check_class(class: &ClassDecl, az: &mut Analyzer) {
    let params = class.type_params.iter().map(|p| p.name.node.clone()).collect();
    az.with_type_params(params, |az| {
        for tp in &class.type_params {
            for bound in &tp.bounds {
                check_type(bound, tp.name.span, az);
            }
        }
        if let Some(superclass) = &class.superclass {
            check_type(superclass, class.name.span, az);
        }
        for interface in &class.interfaces {
            check_type(interface, class.name.span, az);
        }
        check_annotations(&class.annotations, az);
        for field in &class.fields {
            check_type(&field.ty, field.name.span, az);
            check_annotations(&field.annotations, az);
        }

        // Methods, then fields and `this`, each in their own frame outside the
        // method scopes. A field may share its name with a method.
        az.in_scope(|az| {
            let mut declared = std::collections::HashSet::new();
            for method in &class.methods {
                if declared.insert(method.node.name.node.as_str()) {
                    az.declare(&method.node.name.node, SymbolKind::Function, method.node.name.span);
                }
            }
            az.in_scope(|az| {
                for field in &class.fields {
                    az.declare(&field.name.node, SymbolKind::Variable, field.name.span);
                }
                az.declare("this", SymbolKind::Variable, class.name.span);
                for method in &class.methods {
                    check_function(&method.node, az, Some(class));
                }
            });
        });
    });
}

pub(crate) fn check_function(func: &Function, az: &mut Analyzer, owner: Option<&ClassDecl>) {
    let params = func.type_params.iter().map(|p| p.name.node.clone()).collect();
    az.with_type_params(params, |az| {
        for tp in &func.type_params {
            for bound in &tp.bounds {
                check_type(bound, tp.name.span, az);
            }
        }
        check_annotations(&func.annotations, az);
        for p in &func.params {
            check_type(&p.ty, p.name.span, az);
            check_annotations(&p.annotations, az);
        }
        if let Some(ret) = &func.return_type {
            check_type(ret, func.name.span, az);
        }

        tracing::trace!(function = %func.name.node, class = owner.map(|c| c.name.node.as_str()), "checking body");
        // Parameters and the top-level body statements share one frame, so a
        // `let` that reuses a parameter name is a same-frame shadow.
        az.in_scope(|az| {
            for p in &func.params {
                az.declare(&p.name.node, SymbolKind::Variable, p.name.span);
            }
            check_stmts(&func.body.node.stmts, az);
        });
    });
}

fn check_stmts(stmts: &[Spanned<Stmt>], az: &mut Analyzer) {
    for stmt in stmts {
        check_stmt(stmt, az);
    }
}

fn check_block(block: &Spanned<Block>, az: &mut Analyzer) {
    az.in_scope(|az| check_stmts(&block.node.stmts, az));
}

fn check_stmt(stmt: &Spanned<Stmt>, az: &mut Analyzer) {
    match &stmt.node {
        Stmt::Let { name, ty, value } => {
            check_expr(value, az);
            if let Some(ty) = ty {
                check_type(ty, name.span, az);
            }
            az.declare(&name.node, SymbolKind::Variable, name.span);
        }
        Stmt::Assign { target, value } => {
            check_expr(target, az);
            check_expr(value, az);
        }
        Stmt::Return(value) => {
            if let Some(value) = value {
                check_expr(value, az);
            }
        }
        Stmt::If { condition, then_block, else_block } => {
            check_expr(condition, az);
            check_block(then_block, az);
            if let Some(else_block) = else_block {
                check_block(else_block, az);
            }
        }
        Stmt::While { condition, body } => {
            check_expr(condition, az);
            check_block(body, az);
        }
        Stmt::For { var, iterable, body } => {
            check_expr(iterable, az);
            az.in_scope(|az| {
                az.declare(&var.node, SymbolKind::Variable, var.span);
                check_stmts(&body.node.stmts, az);
            });
        }
        Stmt::Break | Stmt::Continue => {}
        Stmt::Block(block) => check_block(block, az),
        Stmt::Expr(expr) => check_expr(expr, az),
    }
}

fn check_expr(expr: &Spanned<Expr>, az: &mut Analyzer) {
    match &expr.node {
        Expr::Literal(_) => {}
        Expr::Ident(name) => resolve_ident(name, expr.span, az),
        Expr::This => resolve_ident("this", expr.span, az),
        Expr::Binary { lhs, rhs, .. } => {
            check_expr(lhs, az);
            check_expr(rhs, az);
        }
        Expr::Unary { operand, .. } => check_expr(operand, az),
        Expr::Call { name, args } => {
            // A type name in call position is a constructor or static reference.
            if az.resolve_type_name(&name.node).is_none() {
                resolve_ident(&name.node, name.span, az);
            }
            check_args(args, az);
        }
        Expr::MethodCall { object, args, .. } => {
            check_receiver(object, az);
            check_args(args, az);
        }
        Expr::FieldAccess { object, .. } => check_receiver(object, az),
        Expr::Index { object, index } => {
            check_expr(object, az);
            check_expr(index, az);
        }
        Expr::Tuple(elements) | Expr::ListLit(elements) => check_args(elements, az),
        Expr::Lambda { params, body } => {
            for p in params {
                check_type(&p.ty, p.name.span, az);
            }
            az.in_scope(|az| {
                for p in params {
                    az.declare(&p.name.node, SymbolKind::Variable, p.name.span);
                }
                check_stmts(&body.node.stmts, az);
            });
        }
        Expr::Match { scrutinee, arms } => {
            check_expr(scrutinee, az);
            for arm in arms {
                az.in_scope(|az| {
                    check_pattern(&arm.pattern, az);
                    check_stmts(&arm.body.node.stmts, az);
                });
            }
        }
    }
}

fn check_args(args: &[Spanned<Expr>], az: &mut Analyzer) {
    for arg in args {
        check_expr(arg, az);
    }
}

/// `Name.member`: a receiver that resolves as a type is a static reference and
/// is not checked as a variable.
fn check_receiver(object: &Spanned<Expr>, az: &mut Analyzer) {
    if let Expr::Ident(name) = &object.node {
        if az.resolve_type_name(name).is_some() {
            return;
        }
    }
    check_expr(object, az);
}

fn check_pattern(pattern: &Spanned<Pattern>, az: &mut Analyzer) {
    match &pattern.node {
        Pattern::Wildcard | Pattern::Literal(_) => {}
        Pattern::Binding(name) => az.declare(name, SymbolKind::Variable, pattern.span),
        Pattern::Constructor { name, fields } => {
            if az.resolve_type_name(&name.node).is_none() {
                report_unresolved_type(&name.node, name.span, az);
            }
            for field in fields {
                check_pattern(field, az);
            }
        }
    }
}

/// Scopes, then top-level declarations, then types.
fn resolve_ident(name: &str, span: Span, az: &mut Analyzer) {
    if az.scopes.lookup(name).is_some() || az.globals.contains(name) {
        return;
    }
    if az.resolve_type_name(name).is_some() {
        return;
    }
    let location = az.location(span);
    let message = if name == "this" {
        "'this' is only available inside class methods".to_string()
    } else {
        format!("undefined symbol '{name}'")
    };
    az.report(
        Diagnostic::error(DiagnosticCode::UndefinedSymbol, message, location.clone())
            .with_suggestion(format!("check that `{name}` is declared or imported")),
    );

    let mut candidates: Vec<String> = az
        .scopes
        .visible_names()
        .map(str::to_string)
        .chain(az.globals.iter().map(|s| s.name.clone()))
        .chain(az.unit_classes.keys().cloned())
        .filter(|c| c != "this")
        .collect();
    candidates.sort();
    candidates.dedup();
    if let Some(close) = closest_name(name, candidates.iter().map(String::as_str)) {
        az.report(
            Diagnostic::hint(DiagnosticCode::DidYouMean, format!("a similar name exists: '{close}'"), location)
                .with_suggestion(format!("did you mean `{close}`?")),
        );
    }
}

/// Every named type in `ty` must resolve; unknown primitive names warn.
fn check_type(ty: &Type, fallback: Span, az: &mut Analyzer) {
    let mut nested = Vec::new();
    ty.walk(&mut |t| nested.push(t.clone()));
    for t in nested {
        let span = t.span().unwrap_or(fallback);
        match t.kind() {
            TypeKind::Named { name, .. } => {
                if az.is_type_param(name) {
                    continue;
                }
                if az.resolve_type_name(name).is_none() {
                    report_unresolved_type(name, span, az);
                }
            }
            TypeKind::Primitive(p) => {
                if PrimitiveKind::parse(&p.name).is_none() {
                    let diag = Diagnostic::warning(
                        DiagnosticCode::UnknownPrimitive,
                        format!("unknown primitive type '{}' is treated as String", p.name),
                        az.location(span),
                    )
                    .with_suggestion("use `String` explicitly, or import the intended type");
                    az.report(diag);
                }
            }
            TypeKind::Optional(_) | TypeKind::Function { .. } | TypeKind::Tuple(_) | TypeKind::TypeParameter { .. } => {}
        }
    }
}

fn report_unresolved_type(name: &str, span: Span, az: &mut Analyzer) {
    let diag = Diagnostic::error(DiagnosticCode::UnresolvedType, format!("cannot resolve type '{name}'"), az.location(span))
        .with_suggestion(format!("add an import for `{name}` or declare it in this unit"));
    az.report(diag);
}

fn check_annotations(annotations: &[Annotation], az: &mut Analyzer) {
    for ann in annotations {
        if az.resolve_type_name(&ann.name.node).is_none() {
            let diag = Diagnostic::error(
                DiagnosticCode::UnresolvedAnnotation,
                format!("cannot resolve annotation '@{}'", ann.name.node),
                az.location(ann.name.span),
            )
            .with_suggestion(format!("import the annotation type `{}`", ann.name.node));
            az.report(diag);
        }
        for arg in &ann.args {
            check_annotation_value(&arg.value, ann.name.span, az);
        }
    }
}

/// Enum and class arguments name types that lowering has to spell as descriptors.
fn check_annotation_value(value: &AnnotationValue, span: Span, az: &mut Analyzer) {
    match value {
        AnnotationValue::Enum { ty, .. } | AnnotationValue::Class(ty) => {
            if PrimitiveKind::parse(ty).is_none() && az.resolve_type_name(ty).is_none() {
                report_unresolved_type(ty, span, az);
            }
        }
        AnnotationValue::Array(items) => {
            for item in items {
                check_annotation_value(item, span, az);
            }
        }
        _ => {}
    }
}
