// jdata.rs — Logger / broadcaster / shuffler compiler.
//
// Declares `jdata` blocks into the global frame and decides, per tier, what a
// read or a write of a jdata entity turns into. Loggers flow from the
// embedded tier to the managed tier, broadcasters the other way; shufflers
// are read and written on the embedded tier.

use tracing::debug;

use crate::ast::{Expr, JdataBlock, Span};
use crate::emit_c;
use crate::emit_js;
use crate::error::{CompileError, Result};
use crate::symbols::{JdataKind, JdataLeaf, Symbol, SymbolTable};
use crate::types::JamType;

/// Declare every entity of a `jdata` block as a global symbol.
///
/// Anonymous blocks declare leaves directly; a namespaced block declares (or
/// extends) a namespace symbol holding the leaves as children.
pub fn declare_block(symbols: &mut SymbolTable, block: &JdataBlock) -> Result<()> {
    let namespace = block.namespace.as_ref().map(|ns| ns.name.clone());
    let mut leaves = Vec::with_capacity(block.specs.len());
    for spec in &block.specs {
        let kind =
            JdataKind::from_name(&spec.kind.name).ok_or_else(|| CompileError::UnknownJdataKind {
                name: spec.name.name.clone(),
                kind: spec.kind.name.clone(),
                span: spec.kind.span,
            })?;
        let ty = JamType::from_type_name(&spec.ty)?;
        if ty == JamType::Callback {
            return Err(CompileError::UnsupportedType {
                ty: spec.ty.spelling(),
                span: spec.ty.span,
            });
        }
        debug!(name = %spec.name.name, kind = kind.as_str(), "declared jdata");
        leaves.push(JdataLeaf {
            name: spec.name.name.clone(),
            namespace: namespace.clone(),
            ty,
            kind,
        });
    }

    match namespace {
        Some(ns) => {
            let mut children = match symbols.lookup(&ns) {
                Some(Symbol::JdataNamespace { children }) => children.clone(),
                _ => Vec::new(),
            };
            for leaf in leaves {
                match children.iter_mut().find(|c| c.name == leaf.name) {
                    Some(existing) => *existing = leaf,
                    None => children.push(leaf),
                }
            }
            symbols.declare_global(ns, Symbol::JdataNamespace { children });
        }
        None => {
            for leaf in leaves {
                symbols.declare_global(leaf.name.clone(), Symbol::JdataLeaf(leaf));
            }
        }
    }
    Ok(())
}

/// The jdata entity an expression names (`x` or `ns.x`), if any.
pub fn resolve<'a>(symbols: &'a SymbolTable, expr: &Expr) -> Option<&'a JdataLeaf> {
    if let Some(name) = expr.as_ident() {
        return symbols.lookup(name).and_then(Symbol::as_jdata);
    }
    expr.as_qualified()
        .and_then(|(ns, field)| symbols.lookup_qualified(ns, &field.name))
}

// ── Embedded tier ───────────────────────────────────────────────────────────

pub fn embedded_read(leaf: &JdataLeaf, span: Span) -> Result<String> {
    let target = leaf.qualified();
    match leaf.kind {
        JdataKind::Logger => Err(CompileError::LoggerRead { name: target, span }),
        JdataKind::Broadcaster => Ok(emit_c::broadcaster_read(&target, leaf.ty)),
        JdataKind::Shuffler => Ok(emit_c::shuffler_poll(&target)),
    }
}

/// Statement replacing `leaf = value;`.
pub fn embedded_write(leaf: &JdataLeaf, value: &str, span: Span) -> Result<String> {
    match leaf.kind {
        JdataKind::Logger => Ok(emit_c::logger_write(
            leaf.runtime_namespace(),
            &leaf.name,
            value,
            leaf.ty,
        )),
        JdataKind::Broadcaster => Err(CompileError::BroadcasterWrite {
            name: leaf.qualified(),
            span,
        }),
        JdataKind::Shuffler => Ok(emit_c::shuffler_push(&leaf.qualified(), value)),
    }
}

/// A typed embedded declaration of `name` must not shadow a broadcaster.
pub fn check_embedded_decl(symbols: &SymbolTable, name: &str, span: Span) -> Result<()> {
    match symbols.lookup(name).and_then(Symbol::as_jdata) {
        Some(leaf) if leaf.kind == JdataKind::Broadcaster => {
            Err(CompileError::BroadcasterRedeclared {
                name: name.to_string(),
                span,
            })
        }
        _ => Ok(()),
    }
}

// ── Managed tier ────────────────────────────────────────────────────────────

/// Statement replacing `leaf = value;`, or `None` when the assignment is
/// emitted unchanged.
pub fn managed_write(leaf: &JdataLeaf, value: &str, span: Span) -> Result<Option<String>> {
    match leaf.kind {
        JdataKind::Broadcaster => Ok(Some(emit_js::broadcast(&leaf.qualified(), value, leaf.ty))),
        JdataKind::Logger => Err(CompileError::ManagedLoggerWrite {
            name: leaf.qualified(),
            span,
        }),
        JdataKind::Shuffler => Ok(None),
    }
}

// ── Whole-program declarations ──────────────────────────────────────────────

enum Entry<'a> {
    Leaf(&'a JdataLeaf),
    Namespace(&'a str, &'a [JdataLeaf]),
}

fn entries(symbols: &SymbolTable) -> Vec<Entry<'_>> {
    symbols
        .globals()
        .into_iter()
        .filter_map(|(name, symbol)| match symbol {
            Symbol::JdataLeaf(leaf) => Some(Entry::Leaf(leaf)),
            Symbol::JdataNamespace { children } => Some(Entry::Namespace(name, children)),
            _ => None,
        })
        .collect()
}

fn all_leaves(symbols: &SymbolTable) -> Vec<&JdataLeaf> {
    entries(symbols)
        .into_iter()
        .flat_map(|entry| match entry {
            Entry::Leaf(leaf) => vec![leaf],
            Entry::Namespace(_, children) => children.iter().collect(),
        })
        .collect()
}

pub fn has_jdata(symbols: &SymbolTable) -> bool {
    !entries(symbols).is_empty()
}

/// Embedded-tier handle declarations: shufflers, broadcasters, then one
/// struct per namespace holding either.
pub fn c_declarations(symbols: &SymbolTable) -> Vec<String> {
    let entries = entries(symbols);
    let mut shufflers = Vec::new();
    let mut broadcasters = Vec::new();
    let mut structs = Vec::new();
    for entry in &entries {
        match entry {
            Entry::Leaf(leaf) => match leaf.kind {
                JdataKind::Shuffler => shufflers.push(emit_c::shuffler_var(&leaf.name)),
                JdataKind::Broadcaster => broadcasters.push(emit_c::broadcaster_var(&leaf.name)),
                JdataKind::Logger => {}
            },
            Entry::Namespace(ns, children) => {
                let members: Vec<String> = children
                    .iter()
                    .filter_map(|leaf| match leaf.kind {
                        JdataKind::Shuffler => Some(emit_c::shuffler_var(&leaf.name)),
                        JdataKind::Broadcaster => Some(emit_c::broadcaster_var(&leaf.name)),
                        JdataKind::Logger => None,
                    })
                    .collect();
                if !members.is_empty() {
                    structs.push(emit_c::namespace_struct(ns, &members));
                }
            }
        }
    }
    shufflers.into_iter().chain(broadcasters).chain(structs).collect()
}

/// `user_setup()` statements binding each handle to the runtime.
pub fn c_links(symbols: &SymbolTable) -> Vec<String> {
    all_leaves(symbols)
        .into_iter()
        .filter_map(|leaf| match leaf.kind {
            JdataKind::Broadcaster => Some(emit_c::broadcaster_init(
                &leaf.qualified(),
                leaf.ty.broadcast_tag().unwrap_or("JBROADCAST_STRING"),
                leaf.runtime_namespace(),
                &leaf.name,
            )),
            JdataKind::Shuffler => Some(emit_c::shuffler_init(&leaf.qualified(), &leaf.qualified())),
            JdataKind::Logger => None,
        })
        .collect()
}

/// Managed-tier logger objects.
pub fn js_declarations(symbols: &SymbolTable) -> Vec<String> {
    entries(symbols)
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Leaf(leaf) if leaf.kind == JdataKind::Logger => {
                Some(emit_js::logger_var(&leaf.name))
            }
            Entry::Leaf(_) => None,
            Entry::Namespace(ns, children) => {
                let loggers: Vec<&str> = children
                    .iter()
                    .filter(|c| c.kind == JdataKind::Logger)
                    .map(|c| c.name.as_str())
                    .collect();
                (!loggers.is_empty()).then(|| emit_js::logger_namespace(ns, &loggers))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ident, JdataSpec, TypeName};
    use chumsky::span::Span as _;

    fn span() -> Span {
        Span::new((), 0..0)
    }

    fn ident(name: &str) -> Ident {
        Ident {
            name: name.into(),
            span: span(),
        }
    }

    fn spec(ty: &str, pointer: usize, name: &str, kind: &str) -> JdataSpec {
        JdataSpec {
            ty: TypeName {
                base: ty.into(),
                pointer,
                span: span(),
            },
            name: ident(name),
            kind: ident(kind),
            span: span(),
        }
    }

    fn sample() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        declare_block(
            &mut symbols,
            &JdataBlock {
                namespace: None,
                specs: vec![
                    spec("int", 0, "count", "logger"),
                    spec("float", 0, "level", "broadcaster"),
                    spec("char", 1, "queue", "shuffler"),
                ],
            },
        )
        .unwrap();
        declare_block(
            &mut symbols,
            &JdataBlock {
                namespace: Some(ident("env")),
                specs: vec![
                    spec("float", 0, "temp", "logger"),
                    spec("int", 0, "mode", "broadcaster"),
                ],
            },
        )
        .unwrap();
        symbols
    }

    fn leaf<'a>(symbols: &'a SymbolTable, name: &str) -> &'a JdataLeaf {
        symbols.lookup(name).and_then(Symbol::as_jdata).unwrap()
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut symbols = SymbolTable::new();
        let err = declare_block(
            &mut symbols,
            &JdataBlock {
                namespace: None,
                specs: vec![spec("int", 0, "x", "mailbox")],
            },
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownJdataKind { .. }));
    }

    #[test]
    fn embedded_policies() {
        let symbols = sample();
        assert!(matches!(
            embedded_read(leaf(&symbols, "count"), span()),
            Err(CompileError::LoggerRead { .. })
        ));
        assert!(matches!(
            embedded_write(leaf(&symbols, "level"), "1.0", span()),
            Err(CompileError::BroadcasterWrite { .. })
        ));
        assert_eq!(
            embedded_read(leaf(&symbols, "level"), span()).unwrap(),
            "atof(get_jbroadcaster_value(level))"
        );
        assert_eq!(
            embedded_write(leaf(&symbols, "queue"), "msg", span()).unwrap(),
            "jshuffler_push(queue, msg);"
        );
        assert_eq!(
            embedded_read(leaf(&symbols, "queue"), span()).unwrap(),
            "(char *)jshuffler_poll(queue)"
        );
        assert!(embedded_write(leaf(&symbols, "count"), "n", span())
            .unwrap()
            .ends_with("jamdata_log_to_server(\"global\", \"count\", jdata_buffer, ((void*)0));"));
    }

    #[test]
    fn namespaced_children_resolve() {
        let symbols = sample();
        let temp = symbols.lookup_qualified("env", "temp").unwrap();
        assert!(embedded_write(temp, "t", span())
            .unwrap()
            .contains("jamdata_log_to_server(\"env\", \"temp\""));
    }

    #[test]
    fn broadcaster_name_cannot_be_redeclared() {
        let symbols = sample();
        assert!(check_embedded_decl(&symbols, "level", span()).is_err());
        assert!(check_embedded_decl(&symbols, "count", span()).is_ok());
        assert!(check_embedded_decl(&symbols, "fresh", span()).is_ok());
    }

    #[test]
    fn managed_policies() {
        let symbols = sample();
        assert!(matches!(
            managed_write(leaf(&symbols, "count"), "1", span()),
            Err(CompileError::ManagedLoggerWrite { .. })
        ));
        let mode = symbols.lookup_qualified("env", "mode").unwrap();
        assert_eq!(
            managed_write(mode, "m", span()).unwrap().unwrap(),
            "JAMManager.broadcastMessage(\"env.mode\", String(Number(m)));"
        );
        assert_eq!(managed_write(leaf(&symbols, "queue"), "q", span()).unwrap(), None);
    }

    #[test]
    fn program_declarations() {
        let symbols = sample();
        assert!(has_jdata(&symbols));
        assert_eq!(
            c_declarations(&symbols),
            vec![
                "jshuffler *queue;".to_string(),
                "jbroadcaster *level;".to_string(),
                "struct env {\njbroadcaster *mode;\n} env;".to_string(),
            ]
        );
        assert_eq!(
            c_links(&symbols),
            vec![
                "level = jambroadcaster_init(JBROADCAST_FLOAT, \"global\", \"level\", NULL);"
                    .to_string(),
                "queue = jshuffler_init(JBROADCAST_STRING, \"queue\", NULL);".to_string(),
                "env.mode = jambroadcaster_init(JBROADCAST_INT, \"env\", \"mode\", NULL);"
                    .to_string(),
            ]
        );
        assert_eq!(
            js_declarations(&symbols),
            vec![
                "var count = new JAMLogger(JAMManager, \"count\");".to_string(),
                "var env = {\n\ttemp: new JAMLogger(JAMManager, \"env.temp\"),\n};".to_string(),
            ]
        );
    }

    #[test]
    fn empty_program_has_no_jdata() {
        assert!(!has_jdata(&SymbolTable::new()));
    }
}
