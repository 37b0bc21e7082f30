//! Kestrel compiler core: type model, resolution cache, semantic analysis,
//! diagnostics and lowering to JVM class files.
//!
//! Parsing is out of scope; callers hand in [`ast::CompilationUnit`]s.

pub mod ast;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod span;
pub mod typeck;

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use ast::CompilationUnit;
use codegen::{lower_unit, LowerOptions};
use config::CompilerConfig;
use diagnostics::{CompileError, Diagnostics};
use typeck::resolve::{NameLookup, TypeResolver};
use typeck::{Analysis, Analyzer};

/// Result of compiling one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Class-file bytes by internal name.
    pub classes: BTreeMap<String, Vec<u8>>,
    /// Non-fatal diagnostics (warnings, infos, hints).
    pub diagnostics: Diagnostics,
    /// Hex SHA-256 over the emitted classes.
    pub fingerprint: String,
}

/// Compiler context: configuration plus the resolver whose cache is shared
/// by every unit compiled through it.
pub struct Compiler {
    config: CompilerConfig,
    resolver: TypeResolver,
}

impl Compiler {
    pub fn new(config: CompilerConfig, lookup: Arc<dyn NameLookup>) -> Self {
        let resolver = TypeResolver::new(lookup, config.cache_capacity());
        Self { config, resolver }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.resolver.clone()).with_default_module(self.config.output.default_module.clone())
    }

    pub fn analyze(&self, unit: &CompilationUnit) -> Analysis {
        self.analyzer().analyze(unit)
    }

    /// Plain-text rendering of `diagnostics` against the unit's source, with
    /// the configured number of context lines.
    pub fn render(&self, diagnostics: &Diagnostics, unit: &CompilationUnit) -> String {
        crate::diagnostics::render::render_all(diagnostics, &unit.source, self.config.diagnostics.context_lines)
    }

    /// Analyze, then lower and encode when analysis reported no errors.
    pub fn compile(&self, unit: &CompilationUnit) -> Result<CompileOutput, CompileError> {
        let analysis = self.analyze(unit);
        let options: LowerOptions = self.config.lower_options();
        let lowered = match lower_unit(unit, &analysis, &options) {
            Ok(lowered) => lowered,
            Err(err) => {
                tracing::info!(file = %unit.path, errors = analysis.diagnostics.error_count(), "compilation rejected");
                return Err(err);
            }
        };
        let classes = lowered.emit()?;
        let fingerprint = fingerprint(&classes);
        tracing::info!(file = %unit.path, classes = classes.len(), fingerprint = %fingerprint, "compiled");
        Ok(CompileOutput { classes, diagnostics: analysis.diagnostics, fingerprint })
    }

    /// Compile many units on a pool of `build.jobs` workers. Results are in input order.
    pub fn compile_all(&self, units: &[CompilationUnit]) -> Vec<Result<CompileOutput, CompileError>> {
        let workers = self.config.jobs().min(units.len()).max(1);
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<usize>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        for index in 0..units.len() {
            // Receiver is alive; cannot fail.
            let _ = work_tx.send(index);
        }
        drop(work_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    while let Ok(index) = work_rx.recv() {
                        let result = self.compile(&units[index]);
                        if done_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(done_tx);

        let mut slots: Vec<Option<Result<CompileOutput, CompileError>>> = (0..units.len()).map(|_| None).collect();
        for (index, result) in done_rx.iter() {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(CompileError::lowering("worker exited without a result"))))
            .collect()
    }
}

/// Hex SHA-256 over names and bytes, in map order.
pub fn fingerprint(classes: &BTreeMap<String, Vec<u8>>) -> String {
    let mut hasher = Sha256::new();
    for (name, bytes) in classes {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}
