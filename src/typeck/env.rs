use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self { name: name.into(), kind, span }
    }
}

/// Lexical scope stack. Lookup searches from innermost to outermost frame.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, Symbol>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost frame, returning its contents.
    pub fn pop(&mut self) -> Option<HashMap<String, Symbol>> {
        self.frames.pop()
    }

    /// Push a frame that is popped when the returned guard drops.
    pub fn enter(&mut self) -> ScopeGuard<'_> {
        self.push();
        ScopeGuard { stack: self }
    }

    /// Declare in the innermost frame (creating one if the stack is empty).
    /// Returns the symbol it replaced when the name was already declared in
    /// that same frame.
    pub fn declare(&mut self, symbol: Symbol) -> Option<Symbol> {
        if self.frames.is_empty() {
            self.push();
        }
        let frame = self.frames.last_mut()?;
        frame.insert(symbol.name.clone(), symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn contains_in_current(&self, name: &str) -> bool {
        self.frames.last().is_some_and(|f| f.contains_key(name))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Every visible name, innermost frames first.
    pub fn visible_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().rev().flat_map(|f| f.keys().map(String::as_str))
    }
}

pub struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeStack;

    fn deref(&self) -> &ScopeStack {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeStack {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

/// Top-level functions and classes of a unit, registered before any body is analyzed.
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol. On a duplicate the first registration is kept and returned.
    pub fn register(&mut self, symbol: Symbol) -> Result<(), &Symbol> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(&self.symbols[&symbol.name]);
        }
        self.order.push(symbol.name.clone());
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.kind == SymbolKind::Class)
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.kind == SymbolKind::Function)
    }

    /// Symbols in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|n| self.symbols.get(n))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Closest candidate within edit distance 2, ties broken by first seen.
pub fn closest_name<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        if candidate == name {
            continue;
        }
        let dist = edit_distance(name, candidate);
        if best.is_none_or(|(_, current)| dist < current) {
            best = Some((candidate, dist));
        }
    }
    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate),
        _ => None,
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
