pub mod check;
pub mod env;
pub mod imports;
pub mod resolve;
pub mod types;

use std::collections::{BTreeMap, HashMap};

use crate::ast::{CompilationUnit, Decl};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::span::{LineIndex, SourceLocation, Span};
use env::{GlobalTable, ScopeStack, Symbol, SymbolKind};
use imports::ImportBindings;
use resolve::TypeResolver;
use types::QualifiedName;

pub const DEFAULT_MODULE: &str = "app";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerPhase {
    AnalyzingUnit,
    AnalyzingImports,
    AnalyzingDeclarations,
    Done,
}

/// How each type spelling in a unit resolved. Lowering's only source of type identities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    entries: BTreeMap<String, QualifiedName>,
}

impl TypeTable {
    pub fn record(&mut self, spelling: impl Into<String>, name: QualifiedName) {
        self.entries.insert(spelling.into(), name);
    }

    pub fn get(&self, spelling: &str) -> Option<&QualifiedName> {
        self.entries.get(spelling)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QualifiedName)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Result of analyzing one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub diagnostics: Diagnostics,
    pub types: TypeTable,
    pub globals: GlobalTable,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Best-effort semantic analysis of one unit at a time.
///
/// Never shared between threads: every field is reset at the start of
/// [`Analyzer::analyze`], and only the resolver's cache outlives a run.
pub struct Analyzer {
    resolver: TypeResolver,
    default_module: String,
    phase: AnalyzerPhase,
    file: String,
    lines: LineIndex,
    scopes: ScopeStack,
    globals: GlobalTable,
    types: TypeTable,
    diagnostics: Diagnostics,
    imports: ImportBindings,
    /// Simple name -> qualified name of every class declared in the unit.
    unit_classes: HashMap<String, QualifiedName>,
    /// Type parameters of enclosing declarations, innermost last.
    type_params: Vec<Vec<String>>,
}

impl Analyzer {
    pub fn new(resolver: TypeResolver) -> Self {
        Self {
            resolver,
            default_module: DEFAULT_MODULE.to_string(),
            phase: AnalyzerPhase::Done,
            file: String::new(),
            lines: LineIndex::new(""),
            scopes: ScopeStack::new(),
            globals: GlobalTable::new(),
            types: TypeTable::default(),
            diagnostics: Diagnostics::new(),
            imports: ImportBindings::default(),
            unit_classes: HashMap::new(),
            type_params: Vec::new(),
        }
    }

    /// Module used for units without a `module` declaration.
    pub fn with_default_module(mut self, module: impl Into<String>) -> Self {
        self.default_module = module.into();
        self
    }

    pub fn phase(&self) -> AnalyzerPhase {
        self.phase
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    pub fn analyze(&mut self, unit: &CompilationUnit) -> Analysis {
        let _span = tracing::debug_span!("analyze", file = %unit.path).entered();
        self.reset(unit);

        self.phase = AnalyzerPhase::AnalyzingUnit;
        self.register_globals(unit);

        self.phase = AnalyzerPhase::AnalyzingImports;
        imports::check_imports(unit, self);

        self.phase = AnalyzerPhase::AnalyzingDeclarations;
        for decl in &unit.declarations {
            match &decl.node {
                Decl::Function(func) => check::check_function(func, self, None),
                Decl::Class(class) => check::check_class(class, self),
            }
        }

        self.phase = AnalyzerPhase::Done;
        tracing::debug!(
            errors = self.diagnostics.error_count(),
            warnings = self.diagnostics.warning_count(),
            resolved_types = self.types.len(),
            "analysis finished"
        );
        Analysis {
            diagnostics: std::mem::take(&mut self.diagnostics),
            types: std::mem::take(&mut self.types),
            globals: std::mem::take(&mut self.globals),
        }
    }

    fn reset(&mut self, unit: &CompilationUnit) {
        self.file = unit.path.clone();
        self.lines = LineIndex::new(&unit.source);
        self.scopes.clear();
        self.globals = GlobalTable::new();
        self.types = TypeTable::default();
        self.diagnostics = Diagnostics::new();
        self.imports = ImportBindings::default();
        self.unit_classes.clear();
        self.type_params.clear();
    }

    /// Forward-reference pre-pass over every top-level declaration.
    fn register_globals(&mut self, unit: &CompilationUnit) {
        let package = unit.package(&self.default_module);
        for decl in &unit.declarations {
            let name = decl.node.name();
            let kind = match &decl.node {
                Decl::Function(_) => SymbolKind::Function,
                Decl::Class(_) => SymbolKind::Class,
            };
            let symbol = Symbol::new(name.node.clone(), kind, name.span);
            if let Err(first_span) = self.globals.register(symbol).map_err(|first| first.span) {
                let first_loc = self.location(first_span);
                let diag = Diagnostic::error(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("'{}' is already declared in this unit", name.node),
                    self.location(name.span),
                )
                .with_suggestion(format!("rename one of the declarations (first declared at {first_loc})"));
                self.diagnostics.push(diag);
                continue;
            }
            if kind == SymbolKind::Class {
                let qualified = QualifiedName::new(format!("{package}.{}", name.node));
                self.unit_classes.insert(name.node.clone(), qualified);
            }
        }
    }

    /// Run `f` inside a fresh scope frame, popped on every exit path of `f`.
    pub(crate) fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scopes.push();
        let result = f(self);
        self.scopes.pop();
        result
    }

    pub(crate) fn with_type_params<R>(&mut self, names: Vec<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.type_params.push(names);
        let result = f(self);
        self.type_params.pop();
        result
    }

    fn is_type_param(&self, name: &str) -> bool {
        self.type_params.iter().rev().any(|frame| frame.iter().any(|p| p == name))
    }

    /// Unit-aware type-name resolution. Successful results land in the type table.
    pub(crate) fn resolve_type_name(&mut self, name: &str) -> Option<QualifiedName> {
        if let Some(found) = self.types.get(name) {
            return Some(found.clone());
        }
        let found = self
            .unit_classes
            .get(name)
            .or_else(|| self.imports.binding(name))
            .cloned()
            .or_else(|| self.resolver.resolve(name))
            .or_else(|| {
                self.imports
                    .wildcard_packages()
                    .iter()
                    .find_map(|pkg| self.resolver.resolve(&format!("{pkg}.{name}")))
            })?;
        self.types.record(name, found.clone());
        Some(found)
    }

    pub(crate) fn declare(&mut self, name: &str, kind: SymbolKind, span: Span) {
        if self.scopes.declare(Symbol::new(name, kind, span)).is_some() {
            let diag = Diagnostic::warning(
                DiagnosticCode::ShadowedBinding,
                format!("'{name}' shadows an earlier binding in the same scope"),
                self.location(span),
            )
            .with_suggestion(format!("rename the second `{name}` if the earlier value is still needed"));
            self.diagnostics.push(diag);
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn location(&self, span: Span) -> SourceLocation {
        self.lines.location(&self.file, span)
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("phase", &self.phase)
            .field("file", &self.file)
            .field("default_module", &self.default_module)
            .finish_non_exhaustive()
    }
}
