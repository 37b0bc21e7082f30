mod common;

use std::fs;
use std::sync::Arc;

use kestrel::ast::*;
use kestrel::config::CompilerConfig;
use kestrel::diagnostics::CompileError;
use kestrel::Compiler;
use tempfile::TempDir;

use common::{class_path, ClassFile};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("kestrel.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn load_reads_every_section() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[cache]
max_entries = 256

[diagnostics]
context_lines = 4

[output]
default_module = "org.acme"
source_file_attribute = false

[build]
jobs = 2
"#,
    );
    let config = CompilerConfig::load(&path).unwrap();
    assert_eq!(config.cache_capacity(), 256);
    assert_eq!(config.diagnostics.context_lines, 4);
    assert_eq!(config.output.default_module, "org.acme");
    assert!(!config.output.source_file_attribute);
    assert_eq!(config.jobs(), 2);
}

#[test]
fn loaded_config_drives_compilation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[output]\ndefault_module = \"org.acme\"\nsource_file_attribute = false\n");
    let compiler = Compiler::new(CompilerConfig::load(&path).unwrap(), Arc::new(class_path()));
    let output = compiler.compile(&CompilationUnit::new("tool.kst", "").with_function(Function::new("main"))).unwrap();
    let facade = ClassFile::parse(&output.classes["org/acme/ToolModule"]);
    assert_eq!(facade.source_file(), None);
    assert_eq!(compiler.resolver().cache().capacity(), 1024);
}

#[test]
fn missing_file_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    match CompilerConfig::load(&path).unwrap_err() {
        CompileError::Config { msg, path: Some(reported) } => {
            assert!(msg.contains("could not read file"), "{msg}");
            assert_eq!(reported, path);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[cache\nmax_entries = 3\n");
    let err = CompilerConfig::load(&path).unwrap_err();
    assert!(matches!(err, CompileError::Config { path: Some(_), .. }), "{err:?}");
    assert!(err.to_string().starts_with("Config error: invalid configuration"), "{err}");
}

#[test]
fn wrong_value_types_are_rejected() {
    let err = CompilerConfig::from_toml_str("[build]\njobs = \"many\"\n").unwrap_err();
    assert!(matches!(err, CompileError::Config { path: None, .. }), "{err:?}");
}

#[test]
fn context_lines_shape_rendered_diagnostics() {
    use kestrel::span::{Span, Spanned};

    let source = "fn main() {\n    let a = 1\n    missing\n    let b = 2\n}";
    let start = source.find("missing").unwrap();
    let span = Span::new(start, start + 7);
    let mut main = Function::new("main");
    main.body = Spanned::dummy(Block { stmts: vec![Spanned::new(Stmt::Expr(Spanned::new(Expr::ident("missing"), span)), span)] });
    let unit = CompilationUnit::new("main.kst", source).with_function(main);

    let config = CompilerConfig::from_toml_str("[diagnostics]\ncontext_lines = 0\n").unwrap();
    let compiler = Compiler::new(config, Arc::new(class_path()));
    let analysis = compiler.analyze(&unit);
    let text = compiler.render(&analysis.diagnostics, &unit);
    assert!(text.contains("3 |     missing"), "{text}");
    assert!(!text.contains("let a"), "{text}");
    assert!(!text.contains("let b"), "{text}");
}
