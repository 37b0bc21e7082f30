use std::fmt::Write as _;
use std::io;

use ariadne::{Config, Label, Report, ReportKind, Source};

use super::{Diagnostic, Diagnostics, Severity};
use crate::span::{LineIndex, SourceLocation};

pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// A window of source lines around a diagnostic location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// `(1-based line number, text)` pairs, in order.
    pub lines: Vec<(u32, String)>,
    pub line: u32,
    pub column: u32,
}

impl Snippet {
    /// Lines `[line - context, line + context]` clamped to the file. `None`
    /// when the location is unknown or points past the last line.
    pub fn extract(source: &str, location: &SourceLocation, context_lines: usize) -> Option<Snippet> {
        if !location.has_location() {
            return None;
        }
        let all: Vec<&str> = source.split('\n').collect();
        let target = location.line as usize;
        if target > all.len() {
            return None;
        }
        let first = target.saturating_sub(context_lines).max(1);
        let last = (target + context_lines).min(all.len());
        let lines = (first..=last)
            .map(|n| (n as u32, all[n - 1].trim_end_matches('\r').to_string()))
            .collect();
        Some(Snippet { lines, line: location.line, column: location.column.max(1) })
    }

    fn gutter_width(&self) -> usize {
        self.lines.last().map(|(n, _)| n.to_string().len()).unwrap_or(1)
    }
}

pub fn render_plain(diagnostic: &Diagnostic, source: &str) -> String {
    render_plain_with(diagnostic, source, DEFAULT_CONTEXT_LINES)
}

/// Compiler-style text rendering with a caret under the offending column.
pub fn render_plain_with(diagnostic: &Diagnostic, source: &str, context_lines: usize) -> String {
    let mut out = format!("{}[{}]: {}\n", diagnostic.severity, diagnostic.code, diagnostic.message);
    if diagnostic.has_location() {
        let _ = writeln!(out, " --> {}", diagnostic.location);
    }
    if let Some(snippet) = Snippet::extract(source, &diagnostic.location, context_lines) {
        let width = snippet.gutter_width();
        for (n, text) in &snippet.lines {
            let _ = writeln!(out, "{n:>width$} | {text}");
            if *n == snippet.line {
                let pad = " ".repeat(snippet.column as usize - 1);
                let _ = writeln!(out, "{:>width$} | {pad}^", "");
            }
        }
    }
    if let Some(help) = &diagnostic.suggestion {
        let _ = writeln!(out, " = help: {help}");
    }
    out
}

/// Render every diagnostic, separated by blank lines.
pub fn render_all(diagnostics: &Diagnostics, source: &str, context_lines: usize) -> String {
    diagnostics
        .iter()
        .map(|d| render_plain_with(d, source, context_lines))
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Info | Severity::Hint => ReportKind::Advice,
    }
}

/// Render a diagnostic with ariadne into `out`, without colors.
pub fn render_report(diagnostic: &Diagnostic, source: &str, out: impl io::Write) -> io::Result<()> {
    let index = LineIndex::new(source);
    let byte = if diagnostic.has_location() {
        index.offset(diagnostic.location.line, diagnostic.location.column).unwrap_or(0)
    } else {
        0
    };
    // ariadne spans count characters.
    let start = source[..byte].chars().count();
    let end = (start + 1).min(source.chars().count()).max(start);

    let mut report = Report::build(report_kind(diagnostic.severity), (), start)
        .with_config(Config::default().with_color(false))
        .with_code(diagnostic.code.as_str())
        .with_message(&diagnostic.message);
    if diagnostic.has_location() {
        report = report.with_label(Label::new(start..end).with_message(&diagnostic.message));
    }
    if let Some(help) = &diagnostic.suggestion {
        report = report.with_help(help);
    }
    report.finish().write(Source::from(source), out)
}
