use std::collections::HashMap;

use crate::ast::{CompilationUnit, ImportDecl};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::span::Span;
use super::types::QualifiedName;
use super::Analyzer;

/// Names introduced by a unit's imports.
#[derive(Debug, Clone, Default)]
pub struct ImportBindings {
    bindings: HashMap<String, QualifiedName>,
    wildcards: Vec<String>,
}

impl ImportBindings {
    pub fn binding(&self, name: &str) -> Option<&QualifiedName> {
        self.bindings.get(name)
    }

    pub fn wildcard_packages(&self) -> &[String] {
        &self.wildcards
    }
}

pub(crate) fn check_imports(unit: &CompilationUnit, az: &mut Analyzer) {
    for import in &unit.imports {
        if import.node.wildcard {
            accept_wildcard(&import.node, import.span, az);
        } else {
            check_single(&import.node, import.span, az);
        }
    }
}

/// Wildcards cannot be verified without scanning the whole package, so they
/// are recorded and later consulted as a last resort during type lookup.
fn accept_wildcard(import: &ImportDecl, span: Span, az: &mut Analyzer) {
    let package = import.full_path();
    tracing::debug!(package = %package, "wildcard import accepted");
    let diag = Diagnostic::info(
        DiagnosticCode::WildcardImport,
        format!("wildcard import of '{package}.*' accepted without verification"),
        az.location(span),
    );
    az.report(diag);
    if !az.imports.wildcards.contains(&package) {
        az.imports.wildcards.push(package);
    }
}

fn check_single(import: &ImportDecl, span: Span, az: &mut Analyzer) {
    let path = import.full_path();
    let Some(binding) = import.binding_name().map(str::to_string) else {
        return;
    };
    match az.resolver.resolve(&path) {
        Some(resolved) => {
            tracing::debug!(import = %path, resolved = %resolved, "import resolved");
            let diag = Diagnostic::info(
                DiagnosticCode::ImportResolved,
                format!("import '{path}' resolved to {resolved}"),
                az.location(span),
            );
            az.report(diag);
            az.types.record(path, resolved.clone());
            az.imports.bindings.insert(binding, resolved);
        }
        None => {
            tracing::debug!(import = %path, "import unresolved");
            let diag = Diagnostic::error(
                DiagnosticCode::UnresolvedImport,
                format!("cannot resolve import '{path}'"),
                az.location(span),
            )
            .with_suggestion(format!("check the spelling of `{path}` or add the library that provides it to the class path"));
            az.report(diag);
        }
    }
}
