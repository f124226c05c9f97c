// symbols.rs — Scoped symbol table.
//
// A stack of frames. The outermost (global) frame lives for the whole
// compilation; one frame is pushed per function or activity body. Lookup
// walks innermost to outermost. Redeclaration within a frame overwrites
// silently but keeps the original insertion position.

use std::collections::HashMap;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use crate::types::JamType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdataKind {
    Logger,
    Broadcaster,
    Shuffler,
}

impl JdataKind {
    pub fn from_name(name: &str) -> Option<JdataKind> {
        match name {
            "logger" => Some(JdataKind::Logger),
            "broadcaster" => Some(JdataKind::Broadcaster),
            "shuffler" => Some(JdataKind::Shuffler),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JdataKind::Logger => "logger",
            JdataKind::Broadcaster => "broadcaster",
            JdataKind::Shuffler => "shuffler",
        }
    }
}

/// A single jdata entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdataLeaf {
    pub name: String,
    /// Enclosing namespace, `None` for anonymous `jdata { ... }` blocks.
    pub namespace: Option<String>,
    pub ty: JamType,
    pub kind: JdataKind,
}

impl JdataLeaf {
    /// `ns.name` or `name`.
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Namespace string passed to the runtime (`"global"` when anonymous).
    pub fn runtime_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("global")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Variable { ty: String },
    Function,
    Activity,
    JdataLeaf(JdataLeaf),
    /// Ordered children of a `jdata ns { ... }` block.
    JdataNamespace { children: Vec<JdataLeaf> },
}

impl Symbol {
    pub fn child(&self, name: &str) -> Option<&JdataLeaf> {
        match self {
            Symbol::JdataNamespace { children } => children.iter().find(|c| c.name == name),
            _ => None,
        }
    }

    pub fn as_jdata(&self) -> Option<&JdataLeaf> {
        match self {
            Symbol::JdataLeaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Symbol::Function | Symbol::Activity)
    }
}

#[derive(Debug, Clone, Default)]
struct Frame {
    order: Vec<String>,
    entries: HashMap<String, Symbol>,
}

impl Frame {
    fn insert(&mut self, name: String, symbol: Symbol) {
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(name, symbol);
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    frames: Vec<Frame>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            frames: vec![Frame::default()],
        }
    }

    /// Declare in the innermost frame, overwriting any previous binding there.
    pub fn declare(&mut self, name: impl Into<String>, symbol: Symbol) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), symbol);
        }
    }

    /// Declare in the global frame regardless of the current depth.
    pub fn declare_global(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.frames[0].insert(name.into(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.entries.get(name))
    }

    /// Resolve `ns.child` through a jdata namespace.
    pub fn lookup_qualified(&self, namespace: &str, child: &str) -> Option<&JdataLeaf> {
        self.lookup(namespace).and_then(|s| s.child(child))
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn exit_scope(&mut self, span: Span) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(CompileError::ScopeUnderflow { span });
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of open scopes above the global frame.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// True when no frame holds any declaration.
    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(|f| f.entries.is_empty())
    }

    /// Global declarations in insertion order.
    pub fn globals(&self) -> Vec<(&str, &Symbol)> {
        let frame = &self.frames[0];
        frame
            .order
            .iter()
            .filter_map(|name| frame.entries.get(name).map(|s| (name.as_str(), s)))
            .collect()
    }
}
