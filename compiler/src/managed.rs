// managed.rs — Managed-tier (JAM-JS) translator.
//
// First pass over the program. Registers named conditions, jdata entities
// and managed activities, re-prints ordinary JS in source order, and records
// every call into the managed call graph (pruned after both passes).
//
// Preconditions: `program` parsed with `parser::parse_managed`.
// Postconditions: `ctx.managed` holds the user code; registries are filled.
// Failure modes: one diagnostic per failing top-level item.
// Side effects: mutates `ctx`.

use std::mem;

use tracing::debug;

use crate::activity::ManagedActivity;
use crate::ast::*;
use crate::callgraph::{ANONYMOUS, ROOT};
use crate::context::CompilerContext;
use crate::emit_js;
use crate::error::Result;
use crate::jdata;
use crate::symbols::Symbol;

/// Translate the managed-tier program into `ctx`.
pub fn translate(ctx: &mut CompilerContext, program: &Program) {
    let mut translator = ManagedTranslator {
        ctx,
        current: ROOT.to_string(),
        awaits: false,
    };
    for item in &program.items {
        let result = translator.item(item);
        let closed = translator.ctx.close_item(item_name(item), item.span);
        match result.and_then(|lines| closed.map(|()| lines)) {
            Ok(lines) => {
                for line in lines {
                    translator.ctx.managed.push_js(line);
                }
            }
            Err(err) => translator.ctx.report(Tier::Managed, err),
        }
    }
    debug!(items = program.items.len(), "managed pass done");
}

fn item_name(item: &Item) -> &str {
    match &item.kind {
        ItemKind::Activity(decl) => decl.name.name.as_str(),
        ItemKind::Function(def) => def.name.as_ref().map_or(ANONYMOUS, |n| n.name.as_str()),
        ItemKind::Jcond(_) => "jcond",
        ItemKind::Jdata(_) => "jdata",
        _ => ROOT,
    }
}

struct ManagedTranslator<'a> {
    ctx: &'a mut CompilerContext,
    /// Caller recorded for call-graph edges.
    current: String,
    /// The body being translated contains an `await`.
    awaits: bool,
}

impl ManagedTranslator<'_> {
    fn item(&mut self, item: &Item) -> Result<Vec<String>> {
        match &item.kind {
            ItemKind::Jcond(block) => {
                let declared = self.ctx.conditions.declare_block(block)?;
                Ok(declared
                    .iter()
                    .map(|(name, cond)| emit_js::jcondition_set(name, cond))
                    .collect())
            }
            ItemKind::Jdata(block) => {
                jdata::declare_block(&mut self.ctx.symbols, block)?;
                Ok(Vec::new())
            }
            ItemKind::Activity(decl) => {
                self.activity(decl, item.span)?;
                Ok(Vec::new())
            }
            ItemKind::Function(def) => Ok(vec![self.function(def, false)?]),
            ItemKind::Stmt(stmt) => Ok(vec![self.stmt(stmt)?]),
            ItemKind::Directive(text) => Ok(vec![text.clone()]),
            ItemKind::Prototype(_) => Ok(Vec::new()),
        }
    }

    fn activity(&mut self, decl: &ActivityDecl, span: Span) -> Result<()> {
        let jcond = self.ctx.conditions.compile_spec(decl.jcond.as_ref())?;
        let name = decl.name.name.clone();
        self.ctx.symbols.declare_global(name.clone(), Symbol::Activity);
        self.ctx.callgraph.add_function(Tier::Managed, &name);

        let (body, awaits) = self.body(name.clone(), &decl.params, &decl.body)?;
        self.ctx.activities.declare_managed(ManagedActivity {
            name,
            kind: decl.kind,
            params: decl.params.iter().map(|p| p.name.name.clone()).collect(),
            jcond,
            body,
            awaits,
            span,
            matched: false,
        });
        Ok(())
    }

    /// Named functions at any depth are known to the call graph. Only
    /// top-level declarations are registered in the `mbox`.
    fn function(&mut self, def: &FunctionDef, expression: bool) -> Result<String> {
        let name = def.name.as_ref().map(|n| n.name.clone());
        if let Some(name) = &name {
            if self.ctx.symbols.depth() == 0 && !expression {
                self.ctx
                    .activities
                    .declare_js_function(name, def.params.len());
            } else {
                self.ctx.activities.declare_nested_function(name);
            }
            self.ctx.symbols.declare(name.clone(), Symbol::Function);
            self.ctx.callgraph.add_function(Tier::Managed, name);
        }
        let caller = name.clone().unwrap_or_else(|| ANONYMOUS.to_string());
        let (body, awaits) = self.body(caller, &def.params, &def.body)?;
        let params: Vec<String> = def.params.iter().map(|p| p.name.name.clone()).collect();
        Ok(emit_js::function(
            name.as_deref(),
            &params,
            &emit_js::block(&body),
            awaits,
        ))
    }

    /// Translate a function or activity body in its own scope.
    fn body(
        &mut self,
        caller: String,
        params: &[Param],
        block: &Block,
    ) -> Result<(Vec<String>, bool)> {
        let saved_current = mem::replace(&mut self.current, caller);
        let saved_awaits = mem::replace(&mut self.awaits, false);

        self.ctx.symbols.enter_scope();
        for param in params {
            self.ctx.symbols.declare(
                param.name.name.clone(),
                Symbol::Variable { ty: "var".into() },
            );
        }
        let result = self.stmts(&block.stmts);
        let exited = self.ctx.symbols.exit_scope(block.span);

        let awaits = mem::replace(&mut self.awaits, saved_awaits);
        self.current = saved_current;
        let lines = result?;
        exited?;
        Ok((lines, awaits))
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<Vec<String>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match &stmt.kind {
            StmtKind::Block(block) => Ok(emit_js::block(&self.stmts(&block.stmts)?)),
            StmtKind::VarDecl { head, name, init } => {
                let keyword = match head {
                    DeclHead::Keyword(keyword) => *keyword,
                    DeclHead::Typed(_) => "var",
                };
                let init = init.as_ref().map(|e| self.expr(e)).transpose()?;
                self.ctx.symbols.declare(
                    name.name.clone(),
                    Symbol::Variable {
                        ty: keyword.to_string(),
                    },
                );
                Ok(emit_js::var_decl(keyword, &name.name, init.as_deref()))
            }
            StmtKind::Assign { target, op, value } => {
                let value = self.expr(value)?;
                if let Some(leaf) = jdata::resolve(&self.ctx.symbols, target) {
                    // `x op= v` writes `x op v`.
                    let combined = match op.strip_suffix('=').filter(|o| !o.is_empty()) {
                        Some(binop) => emit_js::binary(&leaf.qualified(), binop, &value),
                        None => value.clone(),
                    };
                    if let Some(write) = jdata::managed_write(leaf, &combined, stmt.span)? {
                        return Ok(write);
                    }
                }
                let target = self.expr(target)?;
                Ok(emit_js::assign(&target, op, &value))
            }
            StmtKind::Expr(expr) => Ok(emit_js::expr_stmt(&self.expr(expr)?)),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expr(cond)?;
                let then = self.stmt(then)?;
                let otherwise = otherwise.as_ref().map(|s| self.stmt(s)).transpose()?;
                Ok(emit_js::if_stmt(&cond, &then, otherwise.as_deref()))
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond)?;
                Ok(emit_js::while_stmt(&cond, &self.stmt(body)?))
            }
            StmtKind::Return(value) => {
                let value = value.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(emit_js::return_stmt(value.as_deref()))
            }
            StmtKind::Function(def) => self.function(def, false),
            StmtKind::Empty => Ok(";".to_string()),
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match &expr.kind {
            ExprKind::Number(text) | ExprKind::Str(text) | ExprKind::Ident(text) => text.clone(),
            ExprKind::Member { object, field, .. } => emit_js::member(&self.expr(object)?, &field.name),
            ExprKind::Index { object, index } => {
                format!("{}[{}]", self.expr(object)?, self.expr(index)?)
            }
            ExprKind::Call { callee, args } => {
                let callee = self.expr(callee)?;
                let args = emit_js::arg_list(&self.exprs(args)?);
                self.ctx
                    .callgraph
                    .add_call(Tier::Managed, &self.current, &callee, &args);
                format!("{}{}", callee, args)
            }
            ExprKind::Unary { op, operand } => {
                if *op == "await" {
                    self.awaits = true;
                }
                emit_js::unary(op, &self.expr(operand)?)
            }
            ExprKind::Postfix { op, operand } => format!("{}{}", self.expr(operand)?, op),
            ExprKind::Binary { op, lhs, rhs } => {
                emit_js::binary(&self.expr(lhs)?, op, &self.expr(rhs)?)
            }
            ExprKind::Paren(inner) => format!("({})", self.expr(inner)?),
            ExprKind::Array(items) => emit_js::array(&self.exprs(items)?),
            ExprKind::Function(def) => self.function(def, true)?,
        })
    }
}
