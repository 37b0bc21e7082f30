use std::path::Path;

use serde::Deserialize;

use crate::cache::MIN_CAPACITY;
use crate::codegen::LowerOptions;
use crate::diagnostics::render::DEFAULT_CONTEXT_LINES;
use crate::diagnostics::CompileError;
use crate::typeck::DEFAULT_MODULE;

/// Compiler settings, usually read from `kestrel.toml`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub cache: CacheConfig,
    pub diagnostics: DiagnosticsConfig,
    pub output: OutputConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Resolution-cache capacity. Values below the minimum are raised to it.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    pub context_lines: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { context_lines: DEFAULT_CONTEXT_LINES }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub default_module: String,
    pub source_file_attribute: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { default_module: DEFAULT_MODULE.to_string(), source_file_attribute: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Worker threads for multi-unit builds; 0 means available parallelism.
    pub jobs: usize,
}

impl CompilerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, CompileError> {
        Self::parse(content, None)
    }

    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CompileError::config(format!("could not read file: {e}"), Some(path.to_path_buf())))?;
        Self::parse(&content, Some(path))
    }

    fn parse(content: &str, path: Option<&Path>) -> Result<Self, CompileError> {
        let config: CompilerConfig = toml::from_str(content)
            .map_err(|e| CompileError::config(format!("invalid configuration: {e}"), path.map(Path::to_path_buf)))?;
        if config.output.default_module.trim().is_empty() {
            return Err(CompileError::config("output.default_module must not be empty", path.map(Path::to_path_buf)));
        }
        if config.cache.max_entries < MIN_CAPACITY {
            tracing::debug!(requested = config.cache.max_entries, minimum = MIN_CAPACITY, "cache capacity raised");
        }
        Ok(config)
    }

    /// Capacity actually used by the resolution cache.
    pub fn cache_capacity(&self) -> usize {
        self.cache.max_entries.max(MIN_CAPACITY)
    }

    /// Worker count for `Compiler::compile_all`.
    pub fn jobs(&self) -> usize {
        match self.build.jobs {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions {
            default_module: self.output.default_module.clone(),
            source_file_attribute: self.output.source_file_attribute,
        }
    }
}
