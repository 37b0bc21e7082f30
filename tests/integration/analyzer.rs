mod common;

use kestrel::ast::*;
use kestrel::diagnostics::{DiagnosticCode, Severity};
use kestrel::span::{Span, Spanned};
use kestrel::typeck::types::{QualifiedName, Type};

use common::analyzer;

fn int() -> Type {
    Type::primitive("Int")
}

#[test]
fn undefined_identifier_is_one_error_with_suggestion() {
    let unit = CompilationUnit::new("main.kst", "")
        .with_function(Function::new("main").body(vec![Stmt::expr(Expr::ident("missing"))]));
    let analysis = analyzer().analyze(&unit);
    let errors: Vec<_> = analysis.diagnostics.with_severity(Severity::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, DiagnosticCode::UndefinedSymbol);
    assert!(errors[0].suggestion.as_deref().is_some_and(|s| !s.is_empty()));
}

#[test]
fn same_frame_duplicate_is_one_warning_and_no_error() {
    let unit = CompilationUnit::new("main.kst", "").with_function(Function::new("main").body(vec![
        Stmt::let_("x", Expr::int(1)),
        Stmt::let_("x", Expr::int(2)),
        Stmt::expr(Expr::ident("x")),
    ]));
    let analysis = analyzer().analyze(&unit);
    assert!(!analysis.has_errors());
    assert_eq!(analysis.diagnostics.warning_count(), 1);
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::ShadowedBinding).count(), 1);
}

#[test]
fn nested_block_shadowing_is_silent() {
    let unit = CompilationUnit::new("main.kst", "").with_function(Function::new("main").body(vec![
        Stmt::let_("x", Expr::int(1)),
        Stmt::block(vec![Stmt::let_("x", Expr::int(2))]),
    ]));
    let analysis = analyzer().analyze(&unit);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn block_locals_are_gone_after_the_block() {
    let unit = CompilationUnit::new("main.kst", "").with_function(Function::new("main").body(vec![
        Stmt::block(vec![Stmt::let_("inner", Expr::int(1))]),
        Stmt::expr(Expr::ident("inner")),
    ]));
    let analysis = analyzer().analyze(&unit);
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::UndefinedSymbol).count(), 1);
}

#[test]
fn close_names_get_a_hint_after_the_error() {
    let unit = CompilationUnit::new("main.kst", "").with_function(Function::new("main").body(vec![
        Stmt::let_("counter", Expr::int(0)),
        Stmt::expr(Expr::ident("countr")),
    ]));
    let analysis = analyzer().analyze(&unit);
    let codes: Vec<_> = analysis.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::UndefinedSymbol, DiagnosticCode::DidYouMean]);
    let hint = analysis.diagnostics.with_code(DiagnosticCode::DidYouMean).next().unwrap();
    assert_eq!(hint.severity, Severity::Hint);
    assert!(hint.message.contains("counter"));
}

#[test]
fn functions_can_be_called_before_their_declaration() {
    let unit = CompilationUnit::new("main.kst", "")
        .with_function(Function::new("main").body(vec![Stmt::expr(Expr::call("helper", vec![]))]))
        .with_function(Function::new("helper"));
    assert!(analyzer().analyze(&unit).diagnostics.is_empty());
}

#[test]
fn unresolved_field_type_is_an_error() {
    let unit = CompilationUnit::new("main.kst", "").with_class(ClassDecl::new("Order").field("customer", Type::named("Customer")));
    let analysis = analyzer().analyze(&unit);
    let errors: Vec<_> = analysis.diagnostics.with_code(DiagnosticCode::UnresolvedType).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("Customer"));
}

#[test]
fn type_parameters_are_in_scope_for_signatures() {
    let func = Function::new("first")
        .type_param(TypeParam::new("T", vec![Type::named("Comparable")]))
        .param("items", Type::named("List"))
        .param("fallback", Type::named("T"))
        .returns(Type::named("T"))
        .body(vec![Stmt::ret(Expr::ident("fallback"))]);
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    assert!(!analysis.has_errors(), "{:?}", analysis.diagnostics);
    assert_eq!(analysis.types.get("List"), Some(&QualifiedName::new("java.util.List")));
}

#[test]
fn unknown_primitive_names_warn() {
    let func = Function::new("f").param("x", Type::primitive("Strng"));
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    assert!(!analysis.has_errors());
    let warning = analysis.diagnostics.with_code(DiagnosticCode::UnknownPrimitive).next().unwrap();
    assert!(warning.message.contains("treated as String"));
}

#[test]
fn methods_see_fields_and_this() {
    let class = ClassDecl::new("Account")
        .field("balance", int())
        .method(Function::new("total").returns(int()).body(vec![Stmt::ret(Expr::binary(
            BinOp::Add,
            Expr::ident("balance"),
            Expr::field(Expr::This, "balance"),
        ))]));
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_class(class));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn a_field_and_a_method_can_share_a_name() {
    let class = ClassDecl::new("Box")
        .field("size", int())
        .method(Function::new("size").returns(int()).body(vec![Stmt::ret(Expr::ident("size"))]))
        .method(Function::new("twice").returns(int()).body(vec![Stmt::ret(Expr::binary(
            BinOp::Add,
            Expr::call("size", vec![]),
            Expr::ident("size"),
        ))]));
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_class(class));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn a_let_reusing_a_parameter_name_warns() {
    let func = Function::new("f")
        .param("amount", int())
        .body(vec![Stmt::let_("amount", Expr::int(0)), Stmt::expr(Expr::ident("amount"))]);
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    assert!(!analysis.has_errors());
    let warnings: Vec<_> = analysis.diagnostics.with_code(DiagnosticCode::ShadowedBinding).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("'amount'"), "{}", warnings[0].message);
}

#[test]
fn this_outside_a_class_is_an_error() {
    let func = Function::new("f").body(vec![Stmt::expr(Expr::This)]);
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    let error = analysis.diagnostics.with_code(DiagnosticCode::UndefinedSymbol).next().unwrap();
    assert!(error.message.contains("this"));
}

#[test]
fn lambda_parameters_and_match_bindings_are_scoped() {
    let lambda = Expr::lambda(vec![Param::new("n", int())], vec![Stmt::ret(Expr::ident("n"))]);
    let matched = Expr::Match {
        scrutinee: Box::new(Spanned::dummy(Expr::int(1))),
        arms: vec![
            MatchArm::new(Pattern::Binding("v".into()), vec![Stmt::expr(Expr::ident("v"))]),
            MatchArm::new(Pattern::Wildcard, vec![]),
        ],
    };
    let func = Function::new("f").body(vec![
        Stmt::let_("g", lambda),
        Stmt::expr(matched),
        Stmt::expr(Expr::ident("n")),
    ]);
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    let undefined: Vec<_> = analysis.diagnostics.with_code(DiagnosticCode::UndefinedSymbol).collect();
    assert_eq!(undefined.len(), 1, "only the escaped lambda parameter is undefined");
    assert!(undefined[0].message.contains("'n'"));
}

#[test]
fn constructor_patterns_need_a_known_type() {
    let matched = Expr::Match {
        scrutinee: Box::new(Spanned::dummy(Expr::int(1))),
        arms: vec![MatchArm::new(
            Pattern::Constructor { name: Spanned::dummy("Ghost".into()), fields: vec![] },
            vec![],
        )],
    };
    let func = Function::new("f").body(vec![Stmt::expr(matched)]);
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_function(func));
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::UnresolvedType).count(), 1);
}

#[test]
fn unresolved_annotations_and_enum_arguments() {
    let class = ClassDecl::new("Api")
        .annotate(Annotation::new("Missing"))
        .method(Function::new("list").annotate(
            Annotation::new("RequestMapping").named_arg("method", AnnotationValue::Enum { ty: "Verb".into(), constant: "GET".into() }),
        ));
    let analysis = analyzer().analyze(&CompilationUnit::new("main.kst", "").with_class(class));
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::UnresolvedAnnotation).count(), 1);
    assert_eq!(analysis.diagnostics.with_code(DiagnosticCode::UnresolvedType).count(), 1);
}

#[test]
fn diagnostics_carry_source_positions() {
    let source = "fn main() {\n    missing\n}\n";
    let start = source.find("missing").unwrap();
    let stmt = Spanned::new(Stmt::Expr(Spanned::new(Expr::ident("missing"), Span::new(start, start + 7))), Span::new(start, start + 7));
    let mut func = Function::new("main");
    func.body = Spanned::dummy(Block { stmts: vec![stmt] });
    let unit = CompilationUnit::new("src/main.kst", source).with_function(func);
    let analysis = analyzer().analyze(&unit);
    let error = analysis.diagnostics.iter().next().unwrap();
    assert_eq!(error.location.to_string(), "src/main.kst:2:5");
}

#[test]
fn columns_and_carets_count_characters() {
    use kestrel::diagnostics::render::render_plain_with;

    let source = "fn main() {\n    let naïve = missing\n}\n";
    let start = source.find("missing").unwrap();
    let span = Span::new(start, start + 7);
    let stmt = Spanned::new(Stmt::Let { name: Spanned::dummy("naïve".to_string()), ty: None, value: Spanned::new(Expr::ident("missing"), span) }, span);
    let mut func = Function::new("main");
    func.body = Spanned::dummy(Block { stmts: vec![stmt] });
    let unit = CompilationUnit::new("main.kst", source).with_function(func);
    let analysis = analyzer().analyze(&unit);
    let error = analysis.diagnostics.with_code(DiagnosticCode::UndefinedSymbol).next().unwrap();
    assert_eq!(error.location.to_string(), "main.kst:2:17");

    let text = render_plain_with(error, source, 0);
    let lines: Vec<&str> = text.lines().collect();
    let code_line = lines.iter().find(|l| l.starts_with("2 |")).unwrap();
    let caret_line = lines.iter().find(|l| l.trim_end().ends_with('^')).unwrap();
    let word = code_line.find("missing").map(|b| code_line[..b].chars().count());
    assert_eq!(caret_line.chars().position(|c| c == '^'), word);
}

#[test]
fn diagnostics_serialize_to_json() {
    let unit = CompilationUnit::new("main.kst", "")
        .with_function(Function::new("main").body(vec![Stmt::expr(Expr::ident("missing"))]));
    let json = analyzer().analyze(&unit).diagnostics.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let first = &value[0];
    assert_eq!(first["severity"], "error");
    assert_eq!(first["code"], "undefined-symbol");
}
