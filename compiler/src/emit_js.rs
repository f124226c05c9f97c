// emit_js.rs — Managed-tier (JavaScript) target syntax.
//
// Pure formatting functions for the plain and the type-annotated managed
// artifacts. Annotated variants take the JAM types of the parameters and
// spell them as `name: <js type>`.
//
// Preconditions: operands are already-rendered JS expressions.
// Postconditions: returned strings are complete JS fragments.
// Failure modes: none.
// Side effects: none.

use crate::config::CompileOptions;
use crate::jcond::JCond;
use crate::types::{JamType, ReturnType};

// ── Lexical helpers ─────────────────────────────────────────────────────────

/// Double-quoted JS string literal.
pub fn string_literal(text: &str) -> String {
    format!("\"{}\"", escape(text, '"'))
}

/// Single-quoted JS string literal.
pub fn single_quoted(text: &str) -> String {
    format!("'{}'", escape(text, '\''))
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn block(stmts: &[String]) -> String {
    let mut out = String::from("{\n");
    for stmt in stmts {
        out.push_str(stmt);
        out.push('\n');
    }
    out.push('}');
    out
}

pub fn arg_list(args: &[String]) -> String {
    format!("({})", args.join(", "))
}

/// `[a, b]`
pub fn array(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

// ── Statements ──────────────────────────────────────────────────────────────

pub fn var_decl(keyword: &str, name: &str, init: Option<&str>) -> String {
    match init {
        Some(init) => format!("{} {} = {};", keyword, name, init),
        None => format!("{} {};", keyword, name),
    }
}

pub fn assign(target: &str, op: &str, value: &str) -> String {
    format!("{} {} {};", target, op, value)
}

pub fn expr_stmt(expr: &str) -> String {
    format!("{};", expr)
}

pub fn return_stmt(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("return {};", value),
        None => "return;".to_string(),
    }
}

pub fn if_stmt(cond: &str, then: &str, otherwise: Option<&str>) -> String {
    match otherwise {
        Some(otherwise) => format!("if ({}) {} else {}", cond, then, otherwise),
        None => format!("if ({}) {}", cond, then),
    }
}

pub fn while_stmt(cond: &str, body: &str) -> String {
    format!("while ({}) {}", cond, body)
}

/// `[async ]function [name](params) body`
pub fn function(name: Option<&str>, params: &[String], body: &str, is_async: bool) -> String {
    let keyword = if is_async { "async function" } else { "function" };
    match name {
        Some(name) => format!("{} {}({}) {}", keyword, name, params.join(", "), body),
        None => format!("{}({}) {}", keyword, params.join(", "), body),
    }
}

/// Annotated signature: `function f(a: number): string body`.
pub fn annotated_function(
    name: &str,
    params: &[(String, &str)],
    ret: &str,
    body: &str,
    is_async: bool,
) -> String {
    let keyword = if is_async { "async function" } else { "function" };
    let params: Vec<String> = params
        .iter()
        .map(|(n, ty)| format!("{}: {}", n, ty))
        .collect();
    format!("{} {}({}): {} {}", keyword, name, params.join(", "), ret, body)
}

// ── Expressions ─────────────────────────────────────────────────────────────

pub fn binary(lhs: &str, op: &str, rhs: &str) -> String {
    format!("{} {} {}", lhs, op, rhs)
}

pub fn unary(op: &str, operand: &str) -> String {
    if op.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("{} {}", op, operand)
    } else {
        format!("{}{}", op, operand)
    }
}

pub fn member(object: &str, field: &str) -> String {
    format!("{}.{}", object, field)
}

// ── jcond / jdata ───────────────────────────────────────────────────────────

pub fn jcondition_set(qualified: &str, cond: &JCond) -> String {
    format!(
        "jcondition.set({}, {{ source: {}, code: {} }});",
        single_quoted(qualified),
        single_quoted(&cond.source),
        cond.code
    )
}

pub fn broadcast(qualified: &str, value: &str, ty: JamType) -> String {
    let value = if ty.is_text() {
        format!("String({})", value)
    } else {
        format!("String(Number({}))", value)
    };
    format!(
        "JAMManager.broadcastMessage({}, {});",
        string_literal(qualified),
        value
    )
}

pub fn logger_var(name: &str) -> String {
    format!(
        "var {} = new JAMLogger(JAMManager, {});",
        name,
        string_literal(name)
    )
}

pub fn logger_namespace(namespace: &str, children: &[&str]) -> String {
    let mut out = format!("var {} = {{\n", namespace);
    for child in children {
        out.push_str(&format!(
            "\t{}: new JAMLogger(JAMManager, {}),\n",
            child,
            string_literal(&format!("{}.{}", namespace, child))
        ));
    }
    out.push_str("};");
    out
}

// ── Activities ──────────────────────────────────────────────────────────────

fn typed_params(names: &[String], types: &[JamType]) -> Vec<(String, &'static str)> {
    names
        .iter()
        .zip(types)
        .map(|(n, ty)| (n.clone(), ty.js_type()))
        .collect()
}

/// Managed stub of an embedded sync activity: awaits the remote reply.
///
/// `annotate` carries the parameter and return types for the annotated
/// artifact; `None` produces the plain form.
pub fn sync_stub(
    name: &str,
    params: &[String],
    jcond: &JCond,
    annotate: Option<(&[JamType], ReturnType)>,
) -> String {
    let body = block(&[format!(
        "return await jnode.remoteSyncExec({}, {}, {}, {});",
        string_literal(name),
        array(params),
        string_literal(&jcond.source),
        jcond.code
    )]);
    match annotate {
        Some((types, ret)) => annotated_function(
            name,
            &typed_params(params, types),
            &format!("Promise<{}>", ret.js_type()),
            &body,
            true,
        ),
        None => function(Some(name), params, &body, true),
    }
}

/// Managed stub of an embedded async activity: fire and forget.
pub fn async_stub(
    name: &str,
    params: &[String],
    jcond: &JCond,
    annotate: Option<&[JamType]>,
) -> String {
    let mut stmts: Vec<String> = params
        .iter()
        .map(|p| format!("if (typeof {p} === \"function\") {{ {p} = {p}.name; }}"))
        .collect();
    stmts.push(format!(
        "jnode.remoteAsyncExec({}, {}, {}, {});",
        string_literal(name),
        array(params),
        string_literal(&jcond.source),
        jcond.code
    ));
    let body = block(&stmts);
    match annotate {
        Some(types) => {
            annotated_function(name, &typed_params(params, types), "void", &body, false)
        }
        None => function(Some(name), params, &body, false),
    }
}

/// Closure rebinding a renamed callback parameter `_<index>` to `name`.
pub fn callback_rebinding(name: &str, index: usize) -> String {
    format!(
        "var {} = function(x) {{ jnode.remoteAsyncExec(_{}, [x], \"true\", 0); }};",
        name, index
    )
}

// ── Program boilerplate ─────────────────────────────────────────────────────

pub fn requires(options: &CompileOptions, has_jdata: bool) -> Vec<String> {
    let require = |var: &str, module: &str| format!("var {} = require({});", var, single_quoted(module));
    let mut lines = vec![
        require("jamlib", &options.runtime_module("jamlib")),
        require("jnode", &options.runtime_module("jnode")),
        require("http", "http"),
        require("cbor", "cbor"),
        require("qs", "querystring"),
        require("path", "path"),
        require("mime", "mime"),
        require("fs", "fs"),
    ];
    if has_jdata {
        lines.push(require("JAMLogger", &options.runtime_module("jamlogger")));
        lines.push(require("JAMManager", &options.runtime_module("jammanager")));
    }
    lines
}

pub fn main_open() -> &'static str {
    "async function main() {"
}

pub fn jcondition_map() -> &'static str {
    "var jcondition = new Map();"
}

/// The `mbox` registration table plus the runtime start-up calls that close
/// `main`.
pub fn mbox(entries: &[(String, String)]) -> String {
    let mut out = String::from("var mbox = {\n\"functions\": {\n");
    for (name, _) in entries {
        out.push_str(&format!("{}: {},\n", string_literal(name), name));
    }
    out.push_str("},\n\"signatures\": {\n");
    for (name, codes) in entries {
        out.push_str(&format!(
            "{}: {},\n",
            string_literal(name),
            string_literal(codes)
        ));
    }
    out.push_str("}\n};\n");
    out.push_str("jamlib.registerFuncs(mbox);\n");
    out.push_str("jamlib.run(function() { console.log(\"Running...\"); });\n");
    out.push_str("}\nmain();");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(string_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(single_quoted("it's"), "'it\\'s'");
        assert_eq!(single_quoted("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn jcondition_set_escapes_source() {
        let cond = JCond {
            source: "jcondition_context['sys.type'] == 'fog'".into(),
            code: 2,
        };
        assert_eq!(
            jcondition_set("app.fog", &cond),
            "jcondition.set('app.fog', { source: 'jcondition_context[\\'sys.type\\'] == \\'fog\\'', code: 2 });"
        );
    }

    #[test]
    fn sync_stub_plain_and_annotated() {
        let params = vec!["a".to_string(), "b".to_string()];
        let plain = sync_stub("add", &params, &JCond::absent(), None);
        assert_eq!(
            plain,
            "async function add(a, b) {\nreturn await jnode.remoteSyncExec(\"add\", [a, b], \"true\", 0);\n}"
        );
        let types = [JamType::Int, JamType::Int];
        let annotated = sync_stub(
            "add",
            &params,
            &JCond::absent(),
            Some((&types, ReturnType::Value(JamType::Int))),
        );
        assert!(annotated.starts_with("async function add(a: number, b: number): Promise<number> {"));
    }

    #[test]
    fn async_stub_converts_function_arguments() {
        let stub = async_stub("ping", &["msg".to_string()], &JCond::absent(), None);
        assert!(stub.contains("if (typeof msg === \"function\") { msg = msg.name; }"));
        assert!(stub.contains("jnode.remoteAsyncExec(\"ping\", [msg], \"true\", 0);"));
        assert!(!stub.contains("await"));
    }

    #[test]
    fn unary_keywords_take_a_space() {
        assert_eq!(unary("await", "f()"), "await f()");
        assert_eq!(unary("!", "x"), "!x");
    }

    #[test]
    fn broadcast_conversion() {
        assert_eq!(
            broadcast("level", "v", JamType::Int),
            "JAMManager.broadcastMessage(\"level\", String(Number(v)));"
        );
        assert_eq!(
            broadcast("env.name", "n", JamType::Str),
            "JAMManager.broadcastMessage(\"env.name\", String(n));"
        );
    }

    #[test]
    fn logger_namespace_object() {
        assert_eq!(
            logger_namespace("env", &["temp"]),
            "var env = {\n\ttemp: new JAMLogger(JAMManager, \"env.temp\"),\n};"
        );
    }

    #[test]
    fn requires_add_jdata_modules() {
        let opts = CompileOptions::default();
        assert_eq!(requires(&opts, false).len(), 8);
        let with = requires(&opts, true);
        assert_eq!(with.len(), 10);
        assert_eq!(
            with[9],
            "var JAMManager = require('/usr/local/share/jam/lib/jserver/jammanager');"
        );
    }

    #[test]
    fn mbox_lists_functions_and_signatures() {
        let text = mbox(&[("add".to_string(), "nn".to_string())]);
        assert!(text.starts_with("var mbox = {\n\"functions\": {\n\"add\": add,\n},"));
        assert!(text.contains("\"signatures\": {\n\"add\": \"nn\",\n}\n};"));
        assert!(text.ends_with("}\nmain();"));
    }
}
