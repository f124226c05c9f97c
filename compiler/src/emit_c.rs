// emit_c.rs — Embedded-tier (C) target syntax.
//
// Pure formatting functions. Every piece of C text the compiler produces is
// spelled here; the translators decide *what* to emit and pass rendered
// operands in.
//
// Preconditions: operands are already-rendered C expressions.
// Postconditions: returned strings are complete C fragments.
// Failure modes: none.
// Side effects: none.

use crate::jcond::JCond;
use crate::types::{JamType, ReturnType};

// ── Lexical helpers ─────────────────────────────────────────────────────────

/// Double-quoted C string literal.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `{ ... }` with one statement per line.
pub fn block(stmts: &[String]) -> String {
    let mut out = String::from("{\n");
    for stmt in stmts {
        out.push_str(stmt);
        out.push('\n');
    }
    out.push('}');
    out
}

/// `(a, b)`
pub fn arg_list(args: &[String]) -> String {
    format!("({})", args.join(", "))
}

/// `char* name`
pub fn typed_param(ty: &str, name: &str) -> String {
    format!("{} {}", ty, name)
}

// ── Statements ──────────────────────────────────────────────────────────────

pub fn var_decl(ty: &str, name: &str, init: Option<&str>) -> String {
    match init {
        Some(init) => format!("{} {} = {};", ty, name, init),
        None => format!("{} {};", ty, name),
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

pub fn function(ret: &str, name: &str, params: &[String], body: &str) -> String {
    format!("{} {}({}) {}", ret, name, params.join(", "), body)
}

pub fn prototype(ret: &str, name: &str, params: &[String]) -> String {
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!("{} {}({});", ret, name, params)
}

// ── Expressions ─────────────────────────────────────────────────────────────

pub fn binary(lhs: &str, op: &str, rhs: &str) -> String {
    format!("{} {} {}", lhs, op, rhs)
}

pub fn unary(op: &str, operand: &str) -> String {
    format!("{}{}", op, operand)
}

pub fn member(object: &str, field: &str, arrow: bool) -> String {
    if arrow {
        format!("{}->{}", object, field)
    } else {
        format!("{}.{}", object, field)
    }
}

// ── jdata ───────────────────────────────────────────────────────────────────

/// Logger write. Text values are passed through; others are formatted into
/// `jdata_buffer` first.
pub fn logger_write(namespace: &str, name: &str, value: &str, ty: JamType) -> String {
    let call = |arg: &str| {
        format!(
            "jamdata_log_to_server({}, {}, {}, ((void*)0));",
            string_literal(namespace),
            string_literal(name),
            arg
        )
    };
    if ty.is_text() {
        call(value)
    } else {
        format!(
            "sprintf(jdata_buffer, \"{}\", {});\n{}",
            ty.c_pattern(),
            value,
            call("jdata_buffer")
        )
    }
}

pub fn broadcaster_read(target: &str, ty: JamType) -> String {
    let raw = format!("get_jbroadcaster_value({})", target);
    match ty.caster() {
        Some(caster) => format!("{}({})", caster, raw),
        None => raw,
    }
}

pub fn shuffler_push(target: &str, value: &str) -> String {
    format!("jshuffler_push({}, {});", target, value)
}

pub fn shuffler_poll(target: &str) -> String {
    format!("(char *)jshuffler_poll({})", target)
}

pub fn shuffler_var(name: &str) -> String {
    format!("jshuffler *{};", name)
}

pub fn broadcaster_var(name: &str) -> String {
    format!("jbroadcaster *{};", name)
}

/// `struct ns { ... } ns;` holding the handles of a jdata namespace.
pub fn namespace_struct(namespace: &str, members: &[String]) -> String {
    let mut out = format!("struct {} {{\n", namespace);
    for member in members {
        out.push_str(member);
        out.push('\n');
    }
    out.push_str(&format!("}} {};", namespace));
    out
}

pub fn broadcaster_init(target: &str, tag: &str, namespace: &str, name: &str) -> String {
    format!(
        "{} = jambroadcaster_init({}, {}, {}, NULL);",
        target,
        tag,
        string_literal(namespace),
        string_literal(name)
    )
}

pub fn shuffler_init(target: &str, name: &str) -> String {
    format!(
        "{} = jshuffler_init(JBROADCAST_STRING, {}, NULL);",
        target,
        string_literal(name)
    )
}

// ── Activities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sync,
    Async,
}

impl Dispatch {
    fn as_str(self) -> &'static str {
        match self {
            Dispatch::Sync => "SYNC",
            Dispatch::Async => "ASYNC",
        }
    }
}

fn unpacked_args(params: &[JamType]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("cmd->args[{}].val.{}", i, ty.union_field()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `call<name>` dispatch wrapper for a sync activity.
pub fn sync_wrapper(name: &str, params: &[JamType], ret: ReturnType) -> String {
    let call = format!("{}({})", name, unpacked_args(params));
    let complete = match ret {
        ReturnType::Void => format!(
            "{};\nactivity_complete(js->atable, cmd->actid, \"\");",
            call
        ),
        ReturnType::Value(_) => format!(
            "activity_complete(js->atable, cmd->actid, {}, {});",
            string_literal(&ret.c_code()),
            call
        ),
    };
    format!(
        "void call{}(void *act, void *arg) {{\ncommand_t *cmd = (command_t *)arg;\n{}\n}}",
        name, complete
    )
}

/// `call<name>` dispatch wrapper for an async activity or callback target.
pub fn async_wrapper(name: &str, params: &[JamType]) -> String {
    format!(
        "void call{}(void *act, void *arg) {{\ncommand_t *cmd = (command_t *)arg;\n{}({});\n}}",
        name,
        name,
        unpacked_args(params)
    )
}

pub fn regcallback(name: &str, dispatch: Dispatch, codes: &str) -> String {
    format!(
        "activity_regcallback(js->atable, {}, {}, {}, call{});",
        string_literal(name),
        dispatch.as_str(),
        string_literal(codes),
        name
    )
}

fn trailing_args(names: &[String]) -> String {
    names.iter().map(|n| format!(", {}", n)).collect()
}

/// Embedded stub of a managed sync activity: blocks on the remote reply.
pub fn rexec_sync_stub(
    ret: ReturnType,
    name: &str,
    params: &[(JamType, String)],
    jcond: &JCond,
) -> String {
    let typed: Vec<String> = params
        .iter()
        .map(|(ty, n)| typed_param(ty.c_spelling(), n))
        .collect();
    let names: Vec<String> = params.iter().map(|(_, n)| n.clone()).collect();
    let codes: String = params.iter().map(|(ty, _)| ty.c_code()).collect();

    let mut body = vec![format!(
        "arg_t *res = jam_rexec_sync(js, {}, {}, {}, {}{});",
        string_literal(&jcond.source),
        jcond.code,
        string_literal(name),
        string_literal(&codes),
        trailing_args(&names)
    )];
    match ret {
        ReturnType::Void => {
            body.push("command_arg_free(res);".to_string());
            body.push("return;".to_string());
        }
        ReturnType::Value(ty) => {
            let field = format!("res->val.{}", ty.union_field());
            let value = if ty == JamType::Str {
                format!("strdup({})", field)
            } else {
                field
            };
            body.push(format!("{} ret = {};", ty.c_spelling(), value));
            body.push("command_arg_free(res);".to_string());
            body.push("return ret;".to_string());
        }
    }
    function(ret.c_spelling(), name, &typed, &block(&body))
}

/// Embedded stub of a managed async activity: returns the activity handle.
pub fn rexec_async_stub(name: &str, params: &[(JamType, String)], jcond: &JCond) -> String {
    let typed: Vec<String> = params
        .iter()
        .map(|(ty, n)| typed_param(ty.c_spelling(), n))
        .collect();
    let names: Vec<String> = params.iter().map(|(_, n)| n.clone()).collect();
    let codes: String = params.iter().map(|(ty, _)| ty.c_code()).collect();
    let body = vec![
        "jactivity_t *jact = jam_create_activity(js);".to_string(),
        format!(
            "jactivity_t *res = jam_rexec_async(js, jact, {}, {}, {}, {}{});",
            string_literal(&jcond.source),
            jcond.code,
            string_literal(name),
            string_literal(&codes),
            trailing_args(&names)
        ),
        "activity_free(jact);".to_string(),
        "return res;".to_string(),
    ];
    format!("jactivity_t *{}({}) {}", name, typed.join(", "), block(&body))
}

/// Statement-level call through a `jcallback` variable.
pub fn callback_invocation(target: &str, args: &[String]) -> String {
    let codes = "s".repeat(args.len());
    block(&[
        "jactivity_t *jact = jam_create_activity(js);".to_string(),
        format!(
            "jactivity_t *res = jam_rexec_async(js, jact, \"true\", 0, {}, {}{});",
            target,
            string_literal(&codes),
            trailing_args(args)
        ),
        "activity_free(jact);".to_string(),
    ])
}

// ── Program boilerplate ─────────────────────────────────────────────────────

pub fn prelude() -> String {
    [
        "#include <unistd.h>",
        "#include \"jdata.h\"",
        "#include \"jam.h\"",
        "char app_id[256] = { 0 };",
        "char jdata_buffer[20];",
        "typedef char* jcallback;",
        "jamstate_t *js;",
    ]
    .join("\n")
}

pub fn user_setup(lines: &[String]) -> String {
    function("void", "user_setup", &[], &block(lines))
}

pub fn jam_run_app() -> String {
    function(
        "void",
        "jam_run_app",
        &["void *arg".to_string()],
        &block(&["user_main();".to_string()]),
    )
}

pub fn taskmain(port: u16, stack_size: u32) -> String {
    function(
        "void",
        "taskmain",
        &["int argc".to_string(), "char **argv".to_string()],
        &block(&[
            "if (argc > 1) {".to_string(),
            "strncpy(app_id, argv[1], sizeof app_id - 1);".to_string(),
            "}".to_string(),
            format!("js = jam_init({});", port),
            "user_setup();".to_string(),
            format!("taskcreate(jam_event_loop, js, {});", stack_size),
            format!("taskcreate(jam_run_app, js, {});", stack_size),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jcond::JCond;

    #[test]
    fn string_literal_escapes() {
        assert_eq!(string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn sync_wrapper_with_value() {
        let text = sync_wrapper(
            "add",
            &[JamType::Int, JamType::Int],
            ReturnType::Value(JamType::Int),
        );
        assert_eq!(
            text,
            "void calladd(void *act, void *arg) {\n\
             command_t *cmd = (command_t *)arg;\n\
             activity_complete(js->atable, cmd->actid, \"i\", add(cmd->args[0].val.ival, cmd->args[1].val.ival));\n\
             }"
        );
    }

    #[test]
    fn sync_wrapper_void() {
        let text = sync_wrapper("reset", &[], ReturnType::Void);
        assert!(text.contains("reset();\nactivity_complete(js->atable, cmd->actid, \"\");"));
    }

    #[test]
    fn sync_stub_strdups_strings() {
        let text = rexec_sync_stub(
            ReturnType::Value(JamType::Str),
            "name",
            &[(JamType::Int, "id".to_string())],
            &JCond::absent(),
        );
        assert!(text.starts_with("char* name(int id) {\n"));
        assert!(text.contains("arg_t *res = jam_rexec_sync(js, \"true\", 0, \"name\", \"i\", id);"));
        assert!(text.contains("char* ret = strdup(res->val.sval);\ncommand_arg_free(res);\nreturn ret;"));
    }

    #[test]
    fn sync_stub_void_frees_reply() {
        let text = rexec_sync_stub(ReturnType::Void, "poke", &[], &JCond::absent());
        assert!(text.contains("jam_rexec_sync(js, \"true\", 0, \"poke\", \"\");"));
        assert!(text.contains("command_arg_free(res);\nreturn;"));
    }

    #[test]
    fn logger_write_formats_numbers() {
        assert_eq!(
            logger_write("global", "temp", "t", JamType::Float),
            "sprintf(jdata_buffer, \"%f\", t);\njamdata_log_to_server(\"global\", \"temp\", jdata_buffer, ((void*)0));"
        );
        assert_eq!(
            logger_write("env", "name", "s", JamType::Str),
            "jamdata_log_to_server(\"env\", \"name\", s, ((void*)0));"
        );
    }

    #[test]
    fn broadcaster_read_casts() {
        assert_eq!(
            broadcaster_read("level", JamType::Int),
            "atoi(get_jbroadcaster_value(level))"
        );
        assert_eq!(
            broadcaster_read("env.name", JamType::Str),
            "get_jbroadcaster_value(env.name)"
        );
    }

    #[test]
    fn callback_invocation_is_scoped() {
        let text = callback_invocation("cb", &["x".to_string()]);
        assert!(text.starts_with("{\n"));
        assert!(text.contains("jam_rexec_async(js, jact, \"true\", 0, cb, \"s\", x);"));
    }

    #[test]
    fn prototype_without_params() {
        assert_eq!(prototype("void", "g", &[]), "void g(void);");
    }
}
