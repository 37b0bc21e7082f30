mod common;

use kestrel::ast::*;
use kestrel::codegen::{lower_unit, LowerOptions};
use kestrel::diagnostics::CompileError;
use kestrel::span::Spanned;
use kestrel::typeck::types::Type;

use common::{compiler, frame_count, ClassFile};

fn int() -> Type {
    Type::primitive("Int")
}

fn facade(unit: &CompilationUnit) -> ClassFile {
    let output = compiler().compile(unit).unwrap();
    let name = output.classes.keys().find(|k| k.ends_with("Module")).unwrap().clone();
    ClassFile::parse(&output.classes[&name])
}

fn point_class() -> ClassDecl {
    ClassDecl::new("Point").field("x", int()).field("y", int())
}

#[test]
fn if_else_compares_and_returns() {
    let max = Function::new("max").param("a", int()).param("b", int()).returns(int()).body(vec![Stmt::if_(
        Expr::binary(BinOp::Gt, Expr::ident("a"), Expr::ident("b")),
        vec![Stmt::ret(Expr::ident("a"))],
        Some(vec![Stmt::ret(Expr::ident("b"))]),
    )]);
    let class = facade(&CompilationUnit::new("math.kst", "").with_function(max));
    let code = class.code(class.method("max"));
    // iload_0 iload_1 if_icmple +5 iload_0 ireturn iload_1 ireturn
    assert_eq!(code.bytecode, vec![0x1a, 0x1b, 0xa4, 0x00, 0x05, 0x1a, 0xac, 0x1b, 0xac]);
    assert_eq!(frame_count(&code), 1);
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 2);
}

#[test]
fn while_loop_has_header_and_exit_frames() {
    let count = Function::new("count").param("n", int()).returns(int()).body(vec![
        Stmt::let_("i", Expr::int(0)),
        Stmt::while_(
            Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::ident("n")),
            vec![Stmt::assign(Expr::ident("i"), Expr::binary(BinOp::Add, Expr::ident("i"), Expr::int(1)))],
        ),
        Stmt::ret(Expr::ident("i")),
    ]);
    let class = facade(&CompilationUnit::new("loops.kst", "").with_function(count));
    let code = class.code(class.method("count"));
    assert_eq!(frame_count(&code), 2);
    assert_eq!(code.max_locals, 2);
    assert!(code.bytecode.contains(&0xa7), "backward goto");
    assert_eq!(*code.bytecode.last().unwrap(), 0xac);
}

#[test]
fn break_leaves_the_innermost_loop() {
    let spin = Function::new("spin").body(vec![Stmt::while_(
        Expr::bool(true),
        vec![Stmt::if_(Expr::bool(true), vec![Spanned::dummy(Stmt::Break)], None)],
    )]);
    let class = facade(&CompilationUnit::new("spin.kst", "").with_function(spin));
    let method = class.method("spin");
    let code = class.code(method);
    assert_eq!(*code.bytecode.last().unwrap(), 0xb1);
    assert!(class.utf8_entries().iter().all(|s| s != "java/lang/UnsupportedOperationException"));
}

#[test]
fn string_equality_goes_through_objects_equals() {
    let same = Function::new("same")
        .param("a", Type::primitive("String"))
        .param("b", Type::primitive("String"))
        .returns(Type::primitive("Bool"))
        .body(vec![Stmt::ret(Expr::binary(BinOp::Eq, Expr::ident("a"), Expr::ident("b")))]);
    let class = facade(&CompilationUnit::new("eq.kst", "").with_function(same));
    let code = class.code(class.method("same"));
    assert_eq!(&code.bytecode[..3], &[0x2a, 0x2b, 0xb8]);
    let target = u16::from_be_bytes([code.bytecode[3], code.bytecode[4]]);
    assert_eq!(
        class.member_ref(target),
        ("java/util/Objects".into(), "equals".into(), "(Ljava/lang/Object;Ljava/lang/Object;)Z".into())
    );
}

#[test]
fn constructor_calls_allocate_and_initialize() {
    let origin = Function::new("origin")
        .returns(Type::named("Point"))
        .body(vec![Stmt::ret(Expr::call("Point", vec![Expr::int(0), Expr::int(0)]))]);
    let unit = CompilationUnit::new("geo.kst", "").with_module("geo").with_class(point_class()).with_function(origin);
    let class = facade(&unit);
    let method = class.method_with("origin", "()Lgeo/Point;");
    let code = class.code(method);
    // new #, dup, iconst_0, iconst_0, invokespecial #, areturn
    assert_eq!(code.bytecode[0], 0xbb);
    assert_eq!(class.class_name(u16::from_be_bytes([code.bytecode[1], code.bytecode[2]])), "geo/Point");
    assert_eq!(&code.bytecode[3..6], &[0x59, 0x03, 0x03]);
    assert_eq!(code.bytecode[6], 0xb7);
    let init = u16::from_be_bytes([code.bytecode[7], code.bytecode[8]]);
    assert_eq!(class.member_ref(init), ("geo/Point".into(), "<init>".into(), "(II)V".into()));
    assert_eq!(code.bytecode[9], 0xb0);
    assert_eq!(code.max_stack, 4);
}

#[test]
fn foreign_field_reads_use_the_accessor() {
    let norm = Function::new("getXOf")
        .param("p", Type::named("Point"))
        .returns(int())
        .body(vec![Stmt::ret(Expr::field(Expr::ident("p"), "x"))]);
    let unit = CompilationUnit::new("geo.kst", "").with_module("geo").with_class(point_class()).with_function(norm);
    let class = facade(&unit);
    let code = class.code(class.method("getXOf"));
    assert_eq!(&code.bytecode[..2], &[0x2a, 0xb6]);
    let getter = u16::from_be_bytes([code.bytecode[2], code.bytecode[3]]);
    assert_eq!(class.member_ref(getter), ("geo/Point".into(), "getX".into(), "()I".into()));
}

#[test]
fn sibling_calls_pick_invokespecial_for_private_methods() {
    let mut helper = Function::new("helper").returns(int()).body(vec![Stmt::ret(Expr::int(7))]);
    helper.visibility = Visibility::Private;
    let class = ClassDecl::new("Worker")
        .method(Function::new("run").returns(int()).body(vec![Stmt::ret(Expr::binary(
            BinOp::Add,
            Expr::call("helper", vec![]),
            Expr::call("size", vec![]),
        ))]))
        .method(helper)
        .method(Function::new("size").returns(int()).body(vec![Stmt::ret(Expr::int(1))]));
    let output = compiler().compile(&CompilationUnit::new("worker.kst", "").with_class(class)).unwrap();
    let worker = ClassFile::parse(&output.classes["app/Worker"]);
    assert_eq!(worker.method("helper").access, 0x0002);
    let code = worker.code(worker.method("run"));
    // aload_0 invokespecial helper, aload_0 invokevirtual size, iadd, ireturn
    assert_eq!(code.bytecode[0], 0x2a);
    assert_eq!(code.bytecode[1], 0xb7);
    assert_eq!(worker.member_ref(u16::from_be_bytes([code.bytecode[2], code.bytecode[3]])).1, "helper");
    assert_eq!(&code.bytecode[4..6], &[0x2a, 0xb6]);
    assert_eq!(worker.member_ref(u16::from_be_bytes([code.bytecode[6], code.bytecode[7]])).1, "size");
    assert_eq!(&code.bytecode[8..], &[0x60, 0xac]);
}

#[test]
fn overloaded_sibling_calls_pick_the_overload_by_arity() {
    let class = ClassDecl::new("Calc")
        .method(Function::new("f").param("a", int()).returns(int()).body(vec![Stmt::ret(Expr::ident("a"))]))
        .method(Function::new("f").returns(int()).body(vec![Stmt::ret(Expr::int(0))]))
        .method(Function::new("g").returns(int()).body(vec![Stmt::ret(Expr::binary(
            BinOp::Add,
            Expr::call("f", vec![Expr::int(1)]),
            Expr::call("f", vec![]),
        ))]));
    let unit = CompilationUnit::new("calc.kst", "").with_class(class);
    assert!(!compiler().analyze(&unit).has_errors());

    let output = compiler().compile(&unit).unwrap();
    let calc = ClassFile::parse(&output.classes["app/Calc"]);
    calc.method_with("f", "(I)I");
    calc.method_with("f", "()I");
    let code = calc.code(calc.method("g"));
    // aload_0 iconst_1 invokevirtual f(I)I, aload_0 invokevirtual f()I, iadd, ireturn
    assert_eq!(&code.bytecode[..3], &[0x2a, 0x04, 0xb6]);
    let first = calc.member_ref(u16::from_be_bytes([code.bytecode[3], code.bytecode[4]]));
    assert_eq!(first, ("app/Calc".into(), "f".into(), "(I)I".into()));
    assert_eq!(&code.bytecode[5..7], &[0x2a, 0xb6]);
    let second = calc.member_ref(u16::from_be_bytes([code.bytecode[7], code.bytecode[8]]));
    assert_eq!(second, ("app/Calc".into(), "f".into(), "()I".into()));
    assert_eq!(&code.bytecode[9..], &[0x60, 0xac]);
}

#[test]
fn same_arity_overloads_are_told_apart_by_argument_type() {
    let class = ClassDecl::new("Printer")
        .method(Function::new("width").param("n", int()).returns(int()).body(vec![Stmt::ret(Expr::ident("n"))]))
        .method(Function::new("width").param("s", Type::primitive("String")).returns(int()).body(vec![Stmt::ret(Expr::int(1))]));
    let measure = Function::new("measure")
        .param("p", Type::named("Printer"))
        .returns(int())
        .body(vec![Stmt::ret(Expr::method(Expr::ident("p"), "width", vec![Expr::string("text")]))]);
    let unit = CompilationUnit::new("print.kst", "").with_class(class).with_function(measure);
    let class = facade(&unit);
    let pool = class.utf8_entries();
    assert!(pool.contains(&"(Ljava/lang/String;)I".to_string()), "{pool:?}");
    assert!(!pool.contains(&"(I)I".to_string()), "{pool:?}");
}

#[test]
fn no_overload_with_the_argument_count_is_a_lowering_error() {
    let class = ClassDecl::new("Calc")
        .method(Function::new("f").param("a", int()))
        .method(Function::new("f"))
        .method(Function::new("g").body(vec![Stmt::expr(Expr::call("f", vec![Expr::int(1), Expr::int(2)]))]));
    let err = compiler().compile(&CompilationUnit::new("calc.kst", "").with_class(class)).unwrap_err();
    assert!(err.to_string().contains("'f' takes 0 or 1 argument(s) but 2 were supplied"), "{err}");
}

#[test]
fn unsupported_constructs_become_throwing_stubs() {
    let func = Function::new("items").body(vec![Stmt::let_("xs", Expr::ListLit(vec![]))]);
    let unit = CompilationUnit::new("stubs.kst", "").with_function(func);

    let analysis = compiler().analyze(&unit);
    let lowered = lower_unit(&unit, &analysis, &LowerOptions::default()).unwrap();
    let stubs: Vec<_> = lowered.stubs().collect();
    assert_eq!(stubs, vec![("app/StubsModule", "items", "list literals")]);

    let class = facade(&unit);
    let code = class.code(class.method("items"));
    assert_eq!(code.bytecode[0], 0xbb);
    assert_eq!(
        class.class_name(u16::from_be_bytes([code.bytecode[1], code.bytecode[2]])),
        "java/lang/UnsupportedOperationException"
    );
    assert_eq!(*code.bytecode.last().unwrap(), 0xbf);
    assert!(class.utf8_entries().contains(&"items: list literals".to_string()));
}

#[test]
fn falling_off_a_value_function_throws_illegal_state() {
    let func = Function::new("answer").returns(int());
    let class = facade(&CompilationUnit::new("answer.kst", "").with_function(func));
    let code = class.code(class.method("answer"));
    assert_eq!(code.bytecode[0], 0xbb);
    assert_eq!(
        class.class_name(u16::from_be_bytes([code.bytecode[1], code.bytecode[2]])),
        "java/lang/IllegalStateException"
    );
    assert!(class.utf8_entries().contains(&"missing return in 'answer'".to_string()));
}

#[test]
fn wrong_argument_count_is_a_lowering_error() {
    let unit = CompilationUnit::new("calls.kst", "")
        .with_function(Function::new("two").param("a", int()).param("b", int()))
        .with_function(Function::new("caller").body(vec![Stmt::expr(Expr::call("two", vec![Expr::int(1)]))]));
    let err = compiler().compile(&unit).unwrap_err();
    assert!(matches!(err, CompileError::Lowering { .. }), "{err:?}");
    assert!(err.to_string().contains("takes 2 argument(s) but 1 were supplied"), "{err}");
}

#[test]
fn wide_values_use_two_local_slots() {
    let func = Function::new("widen")
        .param("big", Type::primitive("Long"))
        .param("ratio", Type::primitive("Double"))
        .param("n", int())
        .returns(int())
        .body(vec![Stmt::ret(Expr::ident("n"))]);
    let class = facade(&CompilationUnit::new("wide.kst", "").with_function(func));
    let method = class.method_with("widen", "(JDI)I");
    let code = class.code(method);
    assert_eq!(code.max_locals, 5);
    // iload 4, ireturn
    assert_eq!(code.bytecode, vec![0x15, 0x04, 0xac]);
}
