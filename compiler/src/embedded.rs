// embedded.rs — Embedded-tier (JAM-C) translator.
//
// Second pass over the program. Emits embedded activities with their
// dispatch wrappers and managed stubs, matches prototypes against the
// managed activities of the first pass, compiles jdata reads and writes,
// and records calls to known functions in the embedded call graph.
//
// `main` is renamed `user_main`; the runtime's `taskmain` calls it. The
// zero-argument `int main();` prototype discards everything emitted so far.
//
// Preconditions: `program` parsed with `parser::parse_embedded`; the
// managed pass has run on the same context.
// Postconditions: `ctx.embedded` and `ctx.callbacks` hold the output.
// Failure modes: one diagnostic per failing top-level item.
// Side effects: mutates `ctx`.

use std::mem;

use tracing::{debug, info};

use crate::activity::{EmbeddedActivity, Fragment};
use crate::ast::*;
use crate::callgraph::ROOT;
use crate::context::CompilerContext;
use crate::emit_c;
use crate::error::Result;
use crate::jdata;
use crate::symbols::Symbol;
use crate::types::{missing_type, resolve_all, JamType, ReturnType};

const MAIN: &str = "main";
const USER_MAIN: &str = "user_main";
const CALLBACK_TYPE: &str = "jcallback";

/// Translate the embedded-tier program into `ctx`.
pub fn translate(ctx: &mut CompilerContext, program: &Program) {
    ctx.begin_embedded();
    let mut translator = EmbeddedTranslator {
        ctx,
        current: ROOT.to_string(),
    };
    for item in &program.items {
        let result = translator.item(item);
        let closed = translator.ctx.close_item(item_name(item), item.span);
        match result.and_then(|fragment| closed.map(|()| fragment)) {
            Ok(fragment) => translator.ctx.embedded.extend(fragment),
            Err(err) => translator.ctx.report(Tier::Embedded, err),
        }
    }
    debug!(items = program.items.len(), "embedded pass done");
}

fn item_name(item: &Item) -> &str {
    match &item.kind {
        ItemKind::Activity(decl) => decl.name.name.as_str(),
        ItemKind::Prototype(proto) => proto.name.name.as_str(),
        ItemKind::Function(def) => def.name.as_ref().map_or(ROOT, |n| n.name.as_str()),
        _ => ROOT,
    }
}

/// Only the literal `int main();` resets; `int main(void);` is an ordinary
/// prototype.
fn is_main_prototype(proto: &Prototype) -> bool {
    proto.name.name == MAIN
        && proto.ret.spelling() == "int"
        && proto.params.is_empty()
        && !proto.explicit_void
}

fn c_name(name: &str) -> &str {
    if name == MAIN {
        USER_MAIN
    } else {
        name
    }
}

struct EmbeddedTranslator<'a> {
    ctx: &'a mut CompilerContext,
    /// Caller recorded for call-graph edges.
    current: String,
}

impl EmbeddedTranslator<'_> {
    fn item(&mut self, item: &Item) -> Result<Fragment> {
        let mut fragment = Fragment::new();
        match &item.kind {
            ItemKind::Directive(text) => fragment.c.push(text.clone()),
            ItemKind::Activity(decl) => return self.activity(decl, item.span),
            ItemKind::Prototype(proto) if is_main_prototype(proto) => {
                info!("`int main();` found, discarding earlier embedded output");
                self.ctx.reset_embedded();
            }
            ItemKind::Prototype(proto) => return self.prototype(proto, item.span),
            ItemKind::Function(def) => fragment.c.push(self.function(def)?),
            ItemKind::Stmt(stmt) => fragment.c.push(self.stmt(stmt)?),
            ItemKind::Jcond(_) | ItemKind::Jdata(_) => {}
        }
        Ok(fragment)
    }

    fn activity(&mut self, decl: &ActivityDecl, span: Span) -> Result<Fragment> {
        let ret = match (&decl.kind, &decl.ret) {
            (ActivityKind::Sync, Some(ty)) => ReturnType::from_type_name(ty)?,
            _ => ReturnType::Void,
        };
        let params = decl
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(ty) => Ok((JamType::from_type_name(ty)?, p.name.name.clone())),
                None => Err(missing_type(&p.name.name, p.name.span)),
            })
            .collect::<Result<Vec<_>>>()?;
        let jcond = self.ctx.conditions.compile_spec(decl.jcond.as_ref())?;

        let name = decl.name.name.clone();
        self.ctx.symbols.declare_global(name.clone(), Symbol::Activity);
        self.ctx.callgraph.add_function(Tier::Embedded, &name);
        let body = self.body(name.clone(), &decl.params, &decl.body)?;

        self.ctx.activities.emit_embedded(&EmbeddedActivity {
            name,
            kind: decl.kind,
            ret,
            params,
            body,
            jcond,
            span,
        })
    }

    fn prototype(&mut self, proto: &Prototype, span: Span) -> Result<Fragment> {
        let name = proto.name.name.as_str();
        self.ctx.symbols.declare_global(name, Symbol::Function);
        self.ctx.prototypes.insert(
            name.to_string(),
            proto
                .params
                .iter()
                .map(|ty| ty.spelling() == CALLBACK_TYPE)
                .collect(),
        );

        let Some(kind) = self.ctx.activities.pending(name) else {
            let spellings: Vec<String> = proto.params.iter().map(TypeName::spelling).collect();
            let mut fragment = Fragment::new();
            fragment
                .c
                .push(emit_c::prototype(&proto.ret.spelling(), c_name(name), &spellings));
            return Ok(fragment);
        };

        // Async stubs always return the activity handle.
        let ret = match kind {
            ActivityKind::Sync => ReturnType::from_type_name(&proto.ret)?,
            ActivityKind::Async => ReturnType::Void,
        };
        let types = resolve_all(&proto.params)?;
        Ok(self
            .ctx
            .activities
            .match_prototype(name, ret, &types, span)?
            .unwrap_or_default())
    }

    fn function(&mut self, def: &FunctionDef) -> Result<String> {
        let source_name = def.name.as_ref().map_or(ROOT, |n| n.name.as_str());
        let name = c_name(source_name).to_string();
        self.ctx
            .symbols
            .declare_global(source_name.to_string(), Symbol::Function);
        self.ctx.callgraph.add_function(Tier::Embedded, &name);

        let ret = def
            .ret
            .as_ref()
            .map_or_else(|| "int".to_string(), TypeName::spelling);
        let params = def
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(ty) => Ok(emit_c::typed_param(&ty.spelling(), &p.name.name)),
                None => Err(missing_type(&p.name.name, p.name.span)),
            })
            .collect::<Result<Vec<_>>>()?;
        let body = self.body(name.clone(), &def.params, &def.body)?;
        Ok(emit_c::function(&ret, &name, &params, &body))
    }

    /// Translate a function or activity body in its own scope.
    fn body(&mut self, caller: String, params: &[Param], block: &Block) -> Result<String> {
        let saved = mem::replace(&mut self.current, caller);
        self.ctx.symbols.enter_scope();
        for param in params {
            let ty = param.ty.as_ref().map_or_else(String::new, TypeName::spelling);
            self.ctx
                .symbols
                .declare(param.name.name.clone(), Symbol::Variable { ty });
        }
        let result = self.stmts(&block.stmts);
        let exited = self.ctx.symbols.exit_scope(block.span);
        self.current = saved;
        let lines = result?;
        exited?;
        Ok(emit_c::block(&lines))
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<Vec<String>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match &stmt.kind {
            StmtKind::Block(block) => Ok(emit_c::block(&self.stmts(&block.stmts)?)),
            StmtKind::VarDecl { head, name, init } => {
                let ty = match head {
                    DeclHead::Typed(ty) => {
                        jdata::check_embedded_decl(&self.ctx.symbols, &name.name, name.span)?;
                        ty.spelling()
                    }
                    DeclHead::Keyword(keyword) => keyword.to_string(),
                };
                let init = init.as_ref().map(|e| self.expr(e)).transpose()?;
                self.ctx
                    .symbols
                    .declare(name.name.clone(), Symbol::Variable { ty: ty.clone() });
                Ok(emit_c::var_decl(&ty, &name.name, init.as_deref()))
            }
            StmtKind::Assign { target, op, value } => self.assign(target, op, value, stmt.span),
            StmtKind::Expr(expr) => match self.callback_invocation(expr)? {
                Some(text) => Ok(text),
                None => Ok(emit_c::expr_stmt(&self.expr(expr)?)),
            },
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expr(cond)?;
                let then = self.stmt(then)?;
                let otherwise = otherwise.as_ref().map(|s| self.stmt(s)).transpose()?;
                Ok(emit_c::if_stmt(&cond, &then, otherwise.as_deref()))
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond)?;
                Ok(emit_c::while_stmt(&cond, &self.stmt(body)?))
            }
            StmtKind::Return(value) => {
                let value = value.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(emit_c::return_stmt(value.as_deref()))
            }
            StmtKind::Function(def) => self.function(def),
            StmtKind::Empty => Ok(";".to_string()),
        }
    }

    /// Assignment, with writes to jdata entities replaced by runtime calls.
    /// A compound assignment `x op= v` writes `x op v`.
    fn assign(&mut self, target: &Expr, op: &str, value: &Expr, span: Span) -> Result<String> {
        let value = self.expr(value)?;
        let Some(leaf) = jdata::resolve(&self.ctx.symbols, target).cloned() else {
            let target = self.expr(target)?;
            return Ok(emit_c::assign(&target, op, &value));
        };
        let value = match op.strip_suffix('=').filter(|o| !o.is_empty()) {
            Some(binop) => {
                let current = jdata::embedded_read(&leaf, span)?;
                emit_c::binary(&current, binop, &value)
            }
            None => value,
        };
        jdata::embedded_write(&leaf, &value, span)
    }

    /// `cb(x);` where `cb` is a `jcallback` variable: an async remote call
    /// to the function the callback names.
    fn callback_invocation(&mut self, expr: &Expr) -> Result<Option<String>> {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return Ok(None);
        };
        let Some(name) = callee.as_ident() else {
            return Ok(None);
        };
        let is_callback = matches!(
            self.ctx.symbols.lookup(name),
            Some(Symbol::Variable { ty }) if ty == CALLBACK_TYPE
        );
        if !is_callback {
            return Ok(None);
        }
        let args = self.exprs(args)?;
        Ok(Some(emit_c::callback_invocation(name, &args)))
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    /// Arguments of a call. Arguments in `jcallback` positions of a
    /// prototype name a callback function and are passed by name.
    fn call_args(&mut self, callee: Option<&str>, args: &[Expr]) -> Result<Vec<String>> {
        let positions = callee
            .and_then(|name| self.ctx.prototypes.get(name))
            .cloned()
            .unwrap_or_default();
        let mut rendered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let callback = positions.get(i).copied().unwrap_or(false);
            match arg.as_ident() {
                Some(target) if callback => {
                    if let Some(wrapper) = self.ctx.activities.register_callback(target) {
                        self.ctx.callbacks.push(wrapper);
                    }
                    rendered.push(emit_c::string_literal(target));
                }
                _ => rendered.push(self.expr(arg)?),
            }
        }
        Ok(rendered)
    }

    fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match &expr.kind {
            ExprKind::Number(text) | ExprKind::Str(text) => text.clone(),
            ExprKind::Ident(name) => match jdata::resolve(&self.ctx.symbols, expr) {
                Some(leaf) => jdata::embedded_read(leaf, expr.span)?,
                None => name.clone(),
            },
            ExprKind::Member {
                object,
                field,
                arrow,
            } => match jdata::resolve(&self.ctx.symbols, expr) {
                Some(leaf) => jdata::embedded_read(leaf, expr.span)?,
                None => emit_c::member(&self.expr(object)?, &field.name, *arrow),
            },
            ExprKind::Index { object, index } => {
                format!("{}[{}]", self.expr(object)?, self.expr(index)?)
            }
            ExprKind::Call { callee, args } => {
                let name = callee.as_ident();
                let args = self.call_args(name, args)?;
                let rendered_callee = self.expr(callee)?;
                let arg_list = emit_c::arg_list(&args);
                if let Some(name) = name {
                    if self
                        .ctx
                        .symbols
                        .lookup(name)
                        .is_some_and(Symbol::is_callable)
                    {
                        self.ctx
                            .callgraph
                            .add_call(Tier::Embedded, &self.current, name, &arg_list);
                    }
                }
                format!("{}{}", rendered_callee, arg_list)
            }
            ExprKind::Unary { op, operand } => emit_c::unary(op, &self.expr(operand)?),
            ExprKind::Postfix { op, operand } => format!("{}{}", self.expr(operand)?, op),
            ExprKind::Binary { op, lhs, rhs } => {
                emit_c::binary(&self.expr(lhs)?, op, &self.expr(rhs)?)
            }
            ExprKind::Paren(inner) => format!("({})", self.expr(inner)?),
            ExprKind::Array(items) => format!("{{{}}}", self.exprs(items)?.join(", ")),
            ExprKind::Function(def) => self.function(def)?,
        })
    }
}
