pub mod render;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::span::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    UndefinedSymbol,
    UnresolvedImport,
    UnresolvedType,
    UnresolvedAnnotation,
    DuplicateDeclaration,
    ShadowedBinding,
    UnknownPrimitive,
    ImportResolved,
    WildcardImport,
    DidYouMean,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UndefinedSymbol => "undefined-symbol",
            DiagnosticCode::UnresolvedImport => "unresolved-import",
            DiagnosticCode::UnresolvedType => "unresolved-type",
            DiagnosticCode::UnresolvedAnnotation => "unresolved-annotation",
            DiagnosticCode::DuplicateDeclaration => "duplicate-declaration",
            DiagnosticCode::ShadowedBinding => "shadowed-binding",
            DiagnosticCode::UnknownPrimitive => "unknown-primitive",
            DiagnosticCode::ImportResolved => "import-resolved",
            DiagnosticCode::WildcardImport => "wildcard-import",
            DiagnosticCode::DidYouMean => "did-you-mean",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compiler message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: SourceLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self { severity, code, message: message.into(), location, suggestion: None }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Error, code, message, location)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Warning, code, message, location)
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Info, code, message, location)
    }

    pub fn hint(code: DiagnosticCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Hint, code, message, location)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn has_location(&self) -> bool {
        self.location.has_location()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if self.has_location() {
            write!(f, " at {}", self.location)?;
        }
        Ok(())
    }
}

/// Append-only, ordered diagnostics for one compilation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.severity == severity)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Fatal conditions. Recoverable problems are [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation failed with {} error(s)", diagnostics.error_count())]
    Rejected { diagnostics: Diagnostics },

    #[error("Lowering error: {msg}")]
    Lowering { msg: String },

    #[error("Class file error: {msg}")]
    ClassFile { msg: String },

    #[error("Config error: {msg}")]
    Config { msg: String, path: Option<PathBuf> },
}

impl CompileError {
    pub fn rejected(diagnostics: Diagnostics) -> Self {
        Self::Rejected { diagnostics }
    }

    pub fn lowering(msg: impl Into<String>) -> Self {
        Self::Lowering { msg: msg.into() }
    }

    pub fn class_file(msg: impl Into<String>) -> Self {
        Self::ClassFile { msg: msg.into() }
    }

    pub fn config(msg: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    /// Diagnostics carried by a rejection, if any.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            CompileError::Rejected { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}
