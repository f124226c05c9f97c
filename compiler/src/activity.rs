// activity.rs — Activity registry and stub emitter.
//
// Records activities of both tiers and emits the four {sync, async} x
// {embedded, managed} combinations. Embedded activities are emitted where
// they are declared. Managed activities are recorded during the managed
// pass and emitted when an embedded prototype of the same name matches
// them; the rest are left to the assembler as plain functions.
//
// The registry also keeps the dispatch tables that end up in `user_setup()`
// (embedded) and in the `mbox` (managed), and the name sets used to prune
// the managed call graph.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{ActivityKind, Span};
use crate::emit_c::{self, Dispatch};
use crate::emit_js;
use crate::error::{CompileError, Result};
use crate::jcond::JCond;
use crate::types::{c_codes, js_codes, JamType, ReturnType};

/// Generated text for the three artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub c: Vec<String>,
    pub js: Vec<String>,
    pub annotated: Vec<String>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Managed text that is identical in the plain and annotated artifacts.
    pub fn push_js(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.annotated.push(text.clone());
        self.js.push(text);
    }

    pub fn extend(&mut self, other: Fragment) {
        self.c.extend(other.c);
        self.js.extend(other.js);
        self.annotated.extend(other.annotated);
    }

    pub fn clear(&mut self) {
        self.c.clear();
        self.js.clear();
        self.annotated.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.c.is_empty() && self.js.is_empty() && self.annotated.is_empty()
    }
}

/// An embedded-tier activity, with resolved types and a rendered C body.
#[derive(Debug, Clone)]
pub struct EmbeddedActivity {
    pub name: String,
    pub kind: ActivityKind,
    pub ret: ReturnType,
    pub params: Vec<(JamType, String)>,
    pub body: String,
    pub jcond: JCond,
    pub span: Span,
}

/// A managed-tier activity awaiting its embedded prototype.
#[derive(Debug, Clone)]
pub struct ManagedActivity {
    pub name: String,
    pub kind: ActivityKind,
    pub params: Vec<String>,
    pub jcond: JCond,
    /// Translated body statements, without the enclosing braces.
    pub body: Vec<String>,
    /// The body awaits a remote reply and must be an `async function`.
    pub awaits: bool,
    pub span: Span,
    pub matched: bool,
}

/// One dispatch-table entry: function name and signature codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub codes: String,
}

/// Table sizes at the start of the embedded pass.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    c_sync: usize,
    c_async: usize,
    js_sync: usize,
    js_async: usize,
    callbacks: BTreeSet<String>,
    c_activities: BTreeSet<String>,
    matched: Vec<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityRegistry {
    managed: Vec<ManagedActivity>,
    c_sync: Vec<Registration>,
    c_async: Vec<Registration>,
    js_sync: Vec<Registration>,
    js_async: Vec<Registration>,
    callbacks: BTreeSet<String>,
    c_activities: BTreeSet<String>,
    js_functions: BTreeSet<String>,
}

fn register(table: &mut Vec<Registration>, name: &str, codes: String) {
    if !table.iter().any(|r| r.name == name) {
        table.push(Registration {
            name: name.to_string(),
            codes,
        });
    }
}

fn reject_callbacks(name: &str, params: &[(JamType, String)], span: Span) -> Result<()> {
    match params.iter().find(|(ty, _)| *ty == JamType::Callback) {
        Some((_, param)) => Err(CompileError::SyncCallbackParam {
            activity: name.to_string(),
            param: param.clone(),
            span,
        }),
        None => Ok(()),
    }
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Embedded tier ───────────────────────────────────────────────────────

    /// Emit an embedded activity: the native function with its `call<name>`
    /// dispatch wrapper (C) and the remote-execution stub (managed).
    pub fn emit_embedded(&mut self, act: &EmbeddedActivity) -> Result<Fragment> {
        let types: Vec<JamType> = act.params.iter().map(|(ty, _)| *ty).collect();
        let names: Vec<String> = act.params.iter().map(|(_, n)| n.clone()).collect();
        let typed: Vec<String> = act
            .params
            .iter()
            .map(|(ty, n)| emit_c::typed_param(ty.c_spelling(), n))
            .collect();

        let mut fragment = Fragment::new();
        match act.kind {
            ActivityKind::Sync => {
                reject_callbacks(&act.name, &act.params, act.span)?;
                fragment.c.push(emit_c::function(
                    act.ret.c_spelling(),
                    &act.name,
                    &typed,
                    &act.body,
                ));
                fragment
                    .c
                    .push(emit_c::sync_wrapper(&act.name, &types, act.ret));
                fragment
                    .js
                    .push(emit_js::sync_stub(&act.name, &names, &act.jcond, None));
                fragment.annotated.push(emit_js::sync_stub(
                    &act.name,
                    &names,
                    &act.jcond,
                    Some((&types, act.ret)),
                ));
                register(&mut self.c_sync, &act.name, c_codes(&types));
                register(&mut self.js_sync, &act.name, js_codes(&types));
            }
            ActivityKind::Async => {
                fragment
                    .c
                    .push(emit_c::function("void", &act.name, &typed, &act.body));
                fragment.c.push(emit_c::async_wrapper(&act.name, &types));
                fragment
                    .js
                    .push(emit_js::async_stub(&act.name, &names, &act.jcond, None));
                fragment.annotated.push(emit_js::async_stub(
                    &act.name,
                    &names,
                    &act.jcond,
                    Some(&types),
                ));
                register(&mut self.c_async, &act.name, c_codes(&types));
                register(&mut self.js_async, &act.name, js_codes(&types));
            }
        }
        self.c_activities.insert(act.name.clone());
        debug!(name = %act.name, kind = ?act.kind, "embedded activity");
        Ok(fragment)
    }

    /// Register `name` as the target of a callback argument. Returns the
    /// dispatch wrapper the first time a name is seen.
    pub fn register_callback(&mut self, name: &str) -> Option<String> {
        if !self.callbacks.insert(name.to_string()) {
            return None;
        }
        register(&mut self.c_async, name, "s".to_string());
        Some(emit_c::async_wrapper(name, &[JamType::Str]))
    }

    // ── Managed tier ────────────────────────────────────────────────────────

    /// Record a managed activity for matching in the embedded pass.
    pub fn declare_managed(&mut self, act: ManagedActivity) {
        debug!(name = %act.name, kind = ?act.kind, "managed activity");
        self.managed.retain(|m| m.name != act.name);
        self.managed.push(act);
    }

    /// Record a top-level managed function. Single-parameter functions can
    /// be used as callback targets and are registered with signature `"s"`.
    pub fn declare_js_function(&mut self, name: &str, arity: usize) {
        self.declare_nested_function(name);
        if arity == 1 {
            register(&mut self.js_sync, name, "s".to_string());
        }
    }

    /// Record a named function declared inside another function or used as
    /// a function expression. It is known to the call graph but never
    /// reachable through the `mbox`.
    pub fn declare_nested_function(&mut self, name: &str) {
        self.js_functions.insert(name.to_string());
    }

    /// Match an embedded prototype against the managed activity of the same
    /// name. Returns the managed body and the embedded stub, or `None` when
    /// there is nothing (left) to match.
    pub fn match_prototype(
        &mut self,
        name: &str,
        ret: ReturnType,
        types: &[JamType],
        span: Span,
    ) -> Result<Option<Fragment>> {
        let Some(index) = self
            .managed
            .iter()
            .position(|m| m.name == name && !m.matched)
        else {
            return Ok(None);
        };
        let act = &self.managed[index];
        if act.params.len() != types.len() {
            return Err(CompileError::ArityMismatch {
                name: name.to_string(),
                expected: types.len(),
                found: act.params.len(),
                span,
            });
        }
        let params: Vec<(JamType, String)> = types
            .iter()
            .copied()
            .zip(act.params.iter().cloned())
            .collect();

        let fragment = match act.kind {
            ActivityKind::Sync => {
                reject_callbacks(name, &params, span)?;
                let fragment = managed_sync(act, ret, types);
                register(&mut self.js_sync, name, js_codes(types));
                fragment
            }
            ActivityKind::Async => {
                let fragment = managed_async(act, types);
                register(&mut self.js_async, name, js_codes(types));
                fragment
            }
        };
        self.managed[index].matched = true;
        debug!(name, "matched managed activity");
        Ok(Some(fragment))
    }

    /// Kind of the managed activity named `name` still waiting for its
    /// prototype, if any.
    pub fn pending(&self, name: &str) -> Option<ActivityKind> {
        self.managed
            .iter()
            .find(|m| m.name == name && !m.matched)
            .map(|m| m.kind)
    }

    /// Managed activities no prototype matched, in declaration order.
    pub fn unmatched(&self) -> impl Iterator<Item = &ManagedActivity> {
        self.managed.iter().filter(|m| !m.matched)
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    /// `activity_regcallback(...)` lines for `user_setup()`.
    pub fn regcallbacks(&self) -> Vec<String> {
        let sync = self
            .c_sync
            .iter()
            .map(|r| emit_c::regcallback(&r.name, Dispatch::Sync, &r.codes));
        let asynchronous = self
            .c_async
            .iter()
            .map(|r| emit_c::regcallback(&r.name, Dispatch::Async, &r.codes));
        sync.chain(asynchronous).collect()
    }

    /// `(name, signature)` entries of the managed `mbox`.
    pub fn mbox_entries(&self) -> Vec<(String, String)> {
        self.js_sync
            .iter()
            .chain(&self.js_async)
            .map(|r| (r.name.clone(), r.codes.clone()))
            .collect()
    }

    /// Names a managed call-graph edge may point at.
    pub fn is_known(&self, name: &str) -> bool {
        self.js_functions.contains(name)
            || self.c_activities.contains(name)
            || self.managed.iter().any(|m| m.name == name)
    }

    /// Names of every activity of either tier.
    pub fn activity_names(&self) -> BTreeSet<String> {
        self.c_activities
            .iter()
            .cloned()
            .chain(self.managed.iter().map(|m| m.name.clone()))
            .collect()
    }

    // ── Reset support ───────────────────────────────────────────────────────

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            c_sync: self.c_sync.len(),
            c_async: self.c_async.len(),
            js_sync: self.js_sync.len(),
            js_async: self.js_async.len(),
            callbacks: self.callbacks.clone(),
            c_activities: self.c_activities.clone(),
            matched: self.managed.iter().map(|m| m.matched).collect(),
        }
    }

    /// Forget everything registered since `checkpoint` was taken.
    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        self.c_sync.truncate(checkpoint.c_sync);
        self.c_async.truncate(checkpoint.c_async);
        self.js_sync.truncate(checkpoint.js_sync);
        self.js_async.truncate(checkpoint.js_async);
        self.callbacks = checkpoint.callbacks.clone();
        self.c_activities = checkpoint.c_activities.clone();
        for (act, matched) in self.managed.iter_mut().zip(&checkpoint.matched) {
            act.matched = *matched;
        }
    }
}

// ── Managed-activity emission ───────────────────────────────────────────────

/// Managed body as a plain function (unmatched activities).
pub fn plain_function(act: &ManagedActivity) -> String {
    emit_js::function(
        Some(&act.name),
        &act.params,
        &emit_js::block(&act.body),
        act.awaits,
    )
}

fn managed_sync(act: &ManagedActivity, ret: ReturnType, types: &[JamType]) -> Fragment {
    let body = emit_js::block(&act.body);
    let params: Vec<(JamType, String)> = types.iter().copied().zip(act.params.clone()).collect();
    let annotated_ret = if act.awaits {
        format!("Promise<{}>", ret.js_type())
    } else {
        ret.js_type().to_string()
    };
    let typed: Vec<(String, &str)> = params
        .iter()
        .map(|(ty, n)| (n.clone(), ty.js_type()))
        .collect();

    Fragment {
        c: vec![emit_c::rexec_sync_stub(ret, &act.name, &params, &act.jcond)],
        js: vec![plain_function(act)],
        annotated: vec![emit_js::annotated_function(
            &act.name,
            &typed,
            &annotated_ret,
            &body,
            act.awaits,
        )],
    }
}

fn managed_async(act: &ManagedActivity, types: &[JamType]) -> Fragment {
    let mut stmts = Vec::new();
    let mut renamed = Vec::with_capacity(act.params.len());
    for (i, (ty, name)) in types.iter().zip(&act.params).enumerate() {
        if *ty == JamType::Callback {
            stmts.push(emit_js::callback_rebinding(name, i));
            renamed.push(format!("_{}", i));
        } else {
            renamed.push(name.clone());
        }
    }
    stmts.extend(act.body.iter().cloned());
    let body = emit_js::block(&stmts);
    let typed: Vec<(String, &str)> = renamed
        .iter()
        .zip(types)
        .map(|(n, ty)| (n.clone(), ty.js_type()))
        .collect();
    let params: Vec<(JamType, String)> = types.iter().copied().zip(act.params.clone()).collect();

    Fragment {
        c: vec![emit_c::rexec_async_stub(&act.name, &params, &act.jcond)],
        js: vec![emit_js::function(
            Some(&act.name),
            &renamed,
            &body,
            act.awaits,
        )],
        annotated: vec![emit_js::annotated_function(
            &act.name,
            &typed,
            if act.awaits { "Promise<void>" } else { "void" },
            &body,
            act.awaits,
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::span::Span as _;

    fn span() -> Span {
        Span::new((), 0..0)
    }

    fn add() -> EmbeddedActivity {
        EmbeddedActivity {
            name: "add".into(),
            kind: ActivityKind::Sync,
            ret: ReturnType::Value(JamType::Int),
            params: vec![(JamType::Int, "a".into()), (JamType::Int, "b".into())],
            body: "{\nreturn a + b;\n}".into(),
            jcond: JCond::absent(),
            span: span(),
        }
    }

    fn managed(name: &str, kind: ActivityKind, params: &[&str]) -> ManagedActivity {
        ManagedActivity {
            name: name.into(),
            kind,
            params: params.iter().map(|p| p.to_string()).collect(),
            jcond: JCond::absent(),
            body: vec!["console.log(x);".into()],
            awaits: false,
            span: span(),
            matched: false,
        }
    }

    #[test]
    fn embedded_sync_activity() {
        let mut reg = ActivityRegistry::new();
        let fragment = reg.emit_embedded(&add()).unwrap();
        assert_eq!(fragment.c[0], "int add(int a, int b) {\nreturn a + b;\n}");
        assert!(fragment.c[1].contains(
            "activity_complete(js->atable, cmd->actid, \"i\", add(cmd->args[0].val.ival, cmd->args[1].val.ival));"
        ));
        assert!(fragment.js[0].contains("return await jnode.remoteSyncExec(\"add\", [a, b], \"true\", 0);"));
        assert_eq!(
            reg.mbox_entries(),
            vec![("add".to_string(), "nn".to_string())]
        );
        assert_eq!(
            reg.regcallbacks(),
            vec!["activity_regcallback(js->atable, \"add\", SYNC, \"ii\", calladd);".to_string()]
        );
    }

    #[test]
    fn embedded_sync_rejects_callback_param() {
        let mut reg = ActivityRegistry::new();
        let mut act = add();
        act.params[1] = (JamType::Callback, "done".into());
        assert!(matches!(
            reg.emit_embedded(&act),
            Err(CompileError::SyncCallbackParam { .. })
        ));
    }

    #[test]
    fn embedded_async_activity() {
        let mut reg = ActivityRegistry::new();
        let act = EmbeddedActivity {
            name: "ping".into(),
            kind: ActivityKind::Async,
            ret: ReturnType::Void,
            params: vec![(JamType::Str, "msg".into())],
            body: "{\n}".into(),
            jcond: JCond::absent(),
            span: span(),
        };
        let fragment = reg.emit_embedded(&act).unwrap();
        assert!(fragment.c[0].starts_with("void ping(char* msg)"));
        assert!(fragment.c[1].contains("ping(cmd->args[0].val.sval);"));
        assert!(fragment.annotated[0].starts_with("function ping(msg: string): void {"));
        assert!(reg.regcallbacks()[0].contains("ASYNC, \"s\", callping"));
    }

    #[test]
    fn managed_sync_matches_prototype() {
        let mut reg = ActivityRegistry::new();
        reg.declare_managed(managed("scale", ActivityKind::Sync, &["x"]));
        let fragment = reg
            .match_prototype("scale", ReturnType::Value(JamType::Float), &[JamType::Float], span())
            .unwrap()
            .unwrap();
        assert!(fragment.c[0].starts_with("float scale(float x) {\n"));
        assert!(fragment.c[0].contains("float ret = res->val.dval;"));
        assert_eq!(fragment.js[0], "function scale(x) {\nconsole.log(x);\n}");
        assert!(fragment.annotated[0].starts_with("function scale(x: number): number {"));
        assert_eq!(reg.unmatched().count(), 0);
        assert!(reg
            .match_prototype("scale", ReturnType::Void, &[JamType::Float], span())
            .unwrap()
            .is_none());
    }

    #[test]
    fn managed_sync_rejects_callback_param() {
        let mut reg = ActivityRegistry::new();
        reg.declare_managed(managed("f", ActivityKind::Sync, &["cb"]));
        assert!(matches!(
            reg.match_prototype("f", ReturnType::Void, &[JamType::Callback], span()),
            Err(CompileError::SyncCallbackParam { .. })
        ));
    }

    #[test]
    fn arity_mismatch() {
        let mut reg = ActivityRegistry::new();
        reg.declare_managed(managed("f", ActivityKind::Sync, &["a", "b"]));
        assert!(matches!(
            reg.match_prototype("f", ReturnType::Void, &[JamType::Int], span()),
            Err(CompileError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn managed_async_renames_callbacks() {
        let mut reg = ActivityRegistry::new();
        reg.declare_managed(managed("notify", ActivityKind::Async, &["cb", "x"]));
        let fragment = reg
            .match_prototype(
                "notify",
                ReturnType::Void,
                &[JamType::Callback, JamType::Int],
                span(),
            )
            .unwrap()
            .unwrap();
        assert!(fragment.js[0].starts_with(
            "function notify(_0, x) {\nvar cb = function(x) { jnode.remoteAsyncExec(_0, [x], \"true\", 0); };\n"
        ));
        assert!(fragment.annotated[0].starts_with("function notify(_0: string, x: number): void {"));
        assert!(fragment.c[0].starts_with("jactivity_t *notify(jcallback cb, int x) {\n"));
        assert!(fragment.c[0].contains("\"notify\", \"si\", cb, x);"));
        assert_eq!(
            reg.mbox_entries(),
            vec![("notify".to_string(), "sn".to_string())]
        );
    }

    #[test]
    fn callbacks_register_once() {
        let mut reg = ActivityRegistry::new();
        assert!(reg.register_callback("done").is_some());
        assert!(reg.register_callback("done").is_none());
        assert_eq!(reg.regcallbacks().len(), 1);
    }

    #[test]
    fn single_parameter_functions_become_callback_targets() {
        let mut reg = ActivityRegistry::new();
        reg.declare_js_function("onValue", 1);
        reg.declare_js_function("helper", 2);
        assert_eq!(
            reg.mbox_entries(),
            vec![("onValue".to_string(), "s".to_string())]
        );
        assert!(reg.is_known("helper"));
    }

    #[test]
    fn nested_functions_are_known_but_not_in_mbox() {
        let mut reg = ActivityRegistry::new();
        reg.declare_nested_function("inner");
        assert!(reg.is_known("inner"));
        assert!(reg.mbox_entries().is_empty());
    }

    #[test]
    fn restore_forgets_embedded_registrations() {
        let mut reg = ActivityRegistry::new();
        reg.declare_managed(managed("scale", ActivityKind::Sync, &["x"]));
        let checkpoint = reg.checkpoint();
        reg.emit_embedded(&add()).unwrap();
        reg.match_prototype("scale", ReturnType::Void, &[JamType::Int], span())
            .unwrap();
        reg.restore(&checkpoint);
        assert!(reg.regcallbacks().is_empty());
        assert!(reg.mbox_entries().is_empty());
        assert_eq!(reg.unmatched().count(), 1);
        assert!(!reg.is_known("add"));
    }
}
