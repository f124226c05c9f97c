// context.rs — Compilation state shared by both passes.
//
// Owns every registry the translators write into. One context per
// compilation; the managed pass runs first, the embedded pass second.

use std::collections::HashMap;

use tracing::debug;

use crate::activity::{ActivityRegistry, Checkpoint, Fragment};
use crate::ast::{Span, Tier};
use crate::callgraph::CallGraph;
use crate::config::CompileOptions;
use crate::diag::Diagnostic;
use crate::error::{CompileError, Result};
use crate::jcond::ConditionRegistry;
use crate::symbols::SymbolTable;

#[derive(Debug)]
pub struct CompilerContext {
    pub options: CompileOptions,
    pub symbols: SymbolTable,
    pub conditions: ConditionRegistry,
    pub activities: ActivityRegistry,
    pub callgraph: CallGraph,
    pub diagnostics: Vec<Diagnostic>,
    /// Callback positions of each embedded prototype, by name.
    pub prototypes: HashMap<String, Vec<bool>>,
    /// Managed-pass output: user code in source order.
    pub managed: Fragment,
    /// Embedded-pass output: C items plus the managed stubs they imply.
    pub embedded: Fragment,
    /// `call<name>` wrappers of callback targets.
    pub callbacks: Vec<String>,
    checkpoint: Option<Checkpoint>,
}

impl CompilerContext {
    pub fn new(options: CompileOptions) -> Self {
        CompilerContext {
            options,
            symbols: SymbolTable::new(),
            conditions: ConditionRegistry::new(),
            activities: ActivityRegistry::new(),
            callgraph: CallGraph::new(),
            diagnostics: Vec::new(),
            prototypes: HashMap::new(),
            managed: Fragment::new(),
            embedded: Fragment::new(),
            callbacks: Vec::new(),
            checkpoint: None,
        }
    }

    pub fn report(&mut self, tier: Tier, err: CompileError) {
        self.diagnostics.push(Diagnostic::from(err).with_tier(tier));
    }

    pub fn warn(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Close a top-level item. Every scope it entered must have been exited.
    pub fn close_item(&mut self, context: &str, span: Span) -> Result<()> {
        let open = self.symbols.depth();
        if open == 0 {
            return Ok(());
        }
        while self.symbols.depth() > 0 {
            self.symbols.exit_scope(span)?;
        }
        Err(CompileError::ScopeLeak {
            context: context.to_string(),
            open,
            span,
        })
    }

    /// Mark the start of the embedded pass.
    pub fn begin_embedded(&mut self) {
        self.checkpoint = Some(self.activities.checkpoint());
    }

    /// Drop everything the embedded pass produced so far.
    pub fn reset_embedded(&mut self) {
        debug!(
            items = self.embedded.c.len(),
            callbacks = self.callbacks.len(),
            "resetting embedded output"
        );
        self.embedded.clear();
        self.callbacks.clear();
        self.callgraph.reset(Tier::Embedded);
        if let Some(checkpoint) = &self.checkpoint {
            self.activities.restore(checkpoint);
        }
    }
}
