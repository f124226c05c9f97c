// dot.rs — Graphviz DOT output for JAM call graphs
//
// Renders the per-tier call graph as one cluster per tier. Activities are
// highlighted; edge labels carry the distinct argument lists.
//
// Preconditions: `graph` has been pruned by the pipeline.
// Postconditions: returns a valid DOT string representing the graph.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::ast::Tier;
use crate::callgraph::CallGraph;

/// Emit the call graph as a Graphviz DOT string.
///
/// `activities` names the functions of either tier that are activities;
/// they are drawn as filled boxes.
pub fn emit_dot(graph: &CallGraph, activities: &BTreeSet<String>) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "digraph jam {{");
    let _ = writeln!(buf, "    rankdir=LR;");
    let _ = writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];");
    let _ = writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];");

    for tier in [Tier::Embedded, Tier::Managed] {
        let prefix = tier.as_str();
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    subgraph cluster_{prefix} {{");
        let _ = writeln!(buf, "        label=\"{prefix}\";");
        let _ = writeln!(buf, "        style=rounded;");
        let _ = writeln!(buf, "        color=gray50;");

        // Callees that never appear as callers still need a node.
        let mut nodes: BTreeSet<&str> = graph.functions(tier).collect();
        for caller in graph.functions(tier) {
            if let Some(edges) = graph.callees(tier, caller) {
                nodes.extend(edges.keys().map(String::as_str));
            }
        }

        for name in &nodes {
            let _ = writeln!(
                buf,
                "        {} [label=\"{}\", {}];",
                node_id(prefix, name),
                escape(name),
                node_attrs(activities.contains(*name)),
            );
        }

        for caller in graph.functions(tier) {
            let Some(edges) = graph.callees(tier, caller) else {
                continue;
            };
            for (callee, args) in edges {
                let label = args.iter().cloned().collect::<Vec<_>>().join(" | ");
                let _ = writeln!(
                    buf,
                    "        {} -> {} [label=\"{}\"];",
                    node_id(prefix, caller),
                    node_id(prefix, callee),
                    escape(&label),
                );
            }
        }

        let _ = writeln!(buf, "    }}");
    }

    let _ = writeln!(buf, "}}");
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Sanitize a name to valid DOT identifier characters.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn node_id(tier: &str, name: &str) -> String {
    format!("{tier}_{}", sanitize(name))
}

fn node_attrs(is_activity: bool) -> &'static str {
    if is_activity {
        "shape=box, style=filled, fillcolor=lightblue"
    } else {
        "shape=ellipse"
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
