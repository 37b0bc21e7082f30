mod common;

use kestrel::ast::*;
use kestrel::typeck::types::Type;

use common::{compiler, ClassFile};

fn user_unit() -> CompilationUnit {
    CompilationUnit::new("src/user.kst", "")
        .with_module("com.example")
        .with_class(ClassDecl::new("User").field("id", Type::primitive("String")).field("balance", Type::primitive("Int")))
}

fn parse(output: &kestrel::CompileOutput, name: &str) -> ClassFile {
    let bytes = output.classes.get(name).unwrap_or_else(|| panic!("no class {name} in {:?}", output.classes.keys()));
    ClassFile::parse(bytes)
}

#[test]
fn class_lands_in_the_module_package() {
    let output = compiler().compile(&user_unit()).unwrap();
    assert_eq!(output.classes.keys().collect::<Vec<_>>(), vec!["com/example/User"]);
    let class = parse(&output, "com/example/User");
    assert_eq!((class.major, class.minor), (52, 0));
    assert_eq!(class.this_class, "com/example/User");
    assert_eq!(class.super_class, "java/lang/Object");
    assert_eq!(class.access, 0x0021);
}

#[test]
fn fields_get_accessors_and_constructor_parameters() {
    let output = compiler().compile(&user_unit()).unwrap();
    let class = parse(&output, "com/example/User");

    assert_eq!(class.method_names(), vec!["<init>", "getId", "getBalance"]);
    let init = class.method_with("<init>", "(Ljava/lang/String;I)V");
    assert_eq!(class.method_parameters(init), vec!["id", "balance"]);
    assert_eq!(class.method_with("getId", "()Ljava/lang/String;").access, 0x0001);
    assert_eq!(class.method_with("getBalance", "()I").access, 0x0001);

    let id = class.field("id");
    assert_eq!(id.descriptor, "Ljava/lang/String;");
    assert_eq!(id.access & 0x0010, 0x0010, "immutable fields are final");
}

#[test]
fn constructor_chains_to_object_and_stores_fields() {
    let output = compiler().compile(&user_unit()).unwrap();
    let class = parse(&output, "com/example/User");
    let code = class.code(class.method("<init>"));
    // aload_0 invokespecial Object.<init>, then aload_0 aload_1 putfield, aload_0 iload_2 putfield, return
    assert_eq!(code.bytecode[0], 0x2a);
    assert_eq!(code.bytecode[1], 0xb7);
    let super_ref = u16::from_be_bytes([code.bytecode[2], code.bytecode[3]]);
    assert_eq!(class.member_ref(super_ref), ("java/lang/Object".into(), "<init>".into(), "()V".into()));
    assert_eq!(&code.bytecode[4..6], &[0x2a, 0x2b]);
    assert_eq!(code.bytecode[6], 0xb5);
    assert_eq!(&code.bytecode[9..11], &[0x2a, 0x1c]);
    assert_eq!(*code.bytecode.last().unwrap(), 0xb1);
    assert_eq!(code.max_locals, 3);
    assert_eq!(code.max_stack, 2);
}

#[test]
fn explicit_getter_replaces_the_accessor() {
    let unit = CompilationUnit::new("user.kst", "").with_module("com.example").with_class(
        ClassDecl::new("User")
            .field("id", Type::primitive("String"))
            .method(Function::new("getId").returns(Type::primitive("String")).body(vec![Stmt::ret(Expr::string("hidden"))])),
    );
    let output = compiler().compile(&unit).unwrap();
    let class = parse(&output, "com/example/User");
    assert_eq!(class.methods.iter().filter(|m| m.name == "getId").count(), 1);
    assert!(class.utf8_entries().contains(&"hidden".to_string()));
}

#[test]
fn top_level_functions_go_to_the_facade() {
    let unit = CompilationUnit::new("src/user_service.kst", "")
        .with_module("com.example")
        .with_function(Function::new("greet").param("name", Type::primitive("String")).returns(Type::primitive("String")).body(vec![
            Stmt::ret(Expr::binary(BinOp::Add, Expr::string("hello, "), Expr::ident("name"))),
        ]));
    let output = compiler().compile(&unit).unwrap();
    let facade = parse(&output, "com/example/UserServiceModule");
    assert_eq!(facade.access, 0x0031);
    let greet = facade.method_with("greet", "(Ljava/lang/String;)Ljava/lang/String;");
    assert_eq!(greet.access, 0x0009);
    assert_eq!(facade.method_parameters(greet), vec!["name"]);
    assert!(facade.methods.iter().all(|m| m.name != "<init>"));
}

#[test]
fn units_without_functions_have_no_facade() {
    let output = compiler().compile(&user_unit()).unwrap();
    assert!(!output.classes.keys().any(|k| k.ends_with("Module")));
}

#[test]
fn zero_argument_main_gets_an_entry_bridge() {
    let unit = CompilationUnit::new("main.kst", "").with_function(Function::new("main"));
    let output = compiler().compile(&unit).unwrap();
    let facade = parse(&output, "app/MainModule");
    facade.method_with("main", "()V");
    let bridge = facade.method_with("main", "([Ljava/lang/String;)V");
    assert_eq!(bridge.access, 0x0009);
    assert_eq!(facade.method_parameters(bridge), vec!["args"]);
    let code = facade.code(bridge);
    assert_eq!(code.bytecode[0], 0xb8);
    let target = u16::from_be_bytes([code.bytecode[1], code.bytecode[2]]);
    assert_eq!(facade.member_ref(target), ("app/MainModule".into(), "main".into(), "()V".into()));
}

#[test]
fn source_file_attribute_follows_config() {
    let output = compiler().compile(&user_unit()).unwrap();
    assert_eq!(parse(&output, "com/example/User").source_file().as_deref(), Some("user.kst"));

    let mut config = kestrel::config::CompilerConfig::default();
    config.output.source_file_attribute = false;
    let quiet = kestrel::Compiler::new(config, std::sync::Arc::new(common::class_path()));
    let output = quiet.compile(&user_unit()).unwrap();
    assert_eq!(parse(&output, "com/example/User").source_file(), None);
}

#[test]
fn superclass_and_interfaces_resolve_through_imports() {
    let unit = CompilationUnit::new("task.kst", "")
        .with_module("com.example")
        .with_import(ImportDecl::single("java.lang.Runnable"))
        .with_class(ClassDecl::new("Base"))
        .with_class(
            ClassDecl::new("Task")
                .extends(Type::named("Base"))
                .implements(Type::named("Runnable"))
                .method(Function::new("run")),
        );
    let output = compiler().compile(&unit).unwrap();
    let task = parse(&output, "com/example/Task");
    assert_eq!(task.super_class, "com/example/Base");
    assert_eq!(task.interfaces, vec!["java/lang/Runnable"]);
    let init = task.code(task.method("<init>"));
    let super_ref = u16::from_be_bytes([init.bytecode[2], init.bytecode[3]]);
    assert_eq!(task.member_ref(super_ref).0, "com/example/Base");
}

#[test]
fn subclass_constructors_pass_inherited_fields_to_the_base() {
    let unit = CompilationUnit::new("shapes.kst", "")
        .with_class(ClassDecl::new("Derived").extends(Type::named("Middle")).field("active", Type::primitive("Bool")))
        .with_class(ClassDecl::new("Middle").extends(Type::named("Base")).field("name", Type::primitive("String")))
        .with_class(ClassDecl::new("Base").field("id", Type::primitive("Int")));
    let output = compiler().compile(&unit).unwrap();

    let derived = parse(&output, "app/Derived");
    let init = derived.method_with("<init>", "(ILjava/lang/String;Z)V");
    assert_eq!(derived.method_parameters(init), vec!["id", "name", "active"]);
    let code = derived.code(init);
    // aload_0 iload_1 aload_2 invokespecial Middle.<init>, aload_0 iload_3 putfield active, return
    assert_eq!(&code.bytecode[..4], &[0x2a, 0x1b, 0x2c, 0xb7]);
    assert_eq!(&code.bytecode[6..9], &[0x2a, 0x1d, 0xb5]);
    assert_eq!(*code.bytecode.last().unwrap(), 0xb1);
    assert_eq!(code.max_locals, 4);

    for (name, base) in [("app/Derived", "app/Middle"), ("app/Middle", "app/Base"), ("app/Base", "java/lang/Object")] {
        let class = parse(&output, name);
        let code = class.code(class.method("<init>"));
        let at = code.bytecode.iter().position(|&b| b == 0xb7).unwrap();
        let (owner, method, descriptor) = class.member_ref(u16::from_be_bytes([code.bytecode[at + 1], code.bytecode[at + 2]]));
        assert_eq!((owner.as_str(), method.as_str()), (base, "<init>"));
        if base != "java/lang/Object" {
            let base_class = parse(&output, base);
            base_class.method_with("<init>", &descriptor);
        } else {
            assert_eq!(descriptor, "()V");
        }
    }
}

#[test]
fn constructor_calls_of_subclasses_take_inherited_fields_first() {
    let make = Function::new("make")
        .returns(Type::named("Derived"))
        .body(vec![Stmt::ret(Expr::call("Derived", vec![Expr::int(7), Expr::bool(true)]))]);
    let unit = CompilationUnit::new("shapes.kst", "")
        .with_class(ClassDecl::new("Base").field("id", Type::primitive("Int")))
        .with_class(ClassDecl::new("Derived").extends(Type::named("Base")).field("active", Type::primitive("Bool")))
        .with_function(make);
    let output = compiler().compile(&unit).unwrap();
    let facade = parse(&output, "app/ShapesModule");
    let code = facade.code(facade.method("make"));
    let at = code.bytecode.iter().position(|&b| b == 0xb7).unwrap();
    let init = facade.member_ref(u16::from_be_bytes([code.bytecode[at + 1], code.bytecode[at + 2]]));
    assert_eq!(init, ("app/Derived".into(), "<init>".into(), "(IZ)V".into()));
}

#[test]
fn generic_parameters_erase_to_their_bound() {
    let unit = CompilationUnit::new("util.kst", "").with_function(
        Function::new("pick")
            .type_param(TypeParam::new("T", vec![Type::named("Comparable")]))
            .type_param(TypeParam::new("U", vec![]))
            .param("a", Type::named("T"))
            .param("b", Type::named("U"))
            .returns(Type::named("T"))
            .body(vec![Stmt::ret(Expr::ident("a"))]),
    );
    let output = compiler().compile(&unit).unwrap();
    let facade = parse(&output, "app/UtilModule");
    facade.method_with("pick", "(Ljava/lang/Comparable;Ljava/lang/Object;)Ljava/lang/Comparable;");
}

#[test]
fn duplicate_method_signatures_fail_lowering() {
    let unit = CompilationUnit::new("dup.kst", "").with_class(
        ClassDecl::new("Dup")
            .method(Function::new("run"))
            .method(Function::new("run")),
    );
    let err = compiler().compile(&unit).unwrap_err();
    assert!(matches!(err, kestrel::diagnostics::CompileError::Lowering { .. }), "{err:?}");
    assert!(err.to_string().contains("twice"));
}

#[test]
fn class_named_like_the_facade_fails_lowering() {
    let unit = CompilationUnit::new("main.kst", "")
        .with_class(ClassDecl::new("MainModule"))
        .with_function(Function::new("main"));
    let err = compiler().compile(&unit).unwrap_err();
    assert!(err.to_string().contains("collides"));
}
