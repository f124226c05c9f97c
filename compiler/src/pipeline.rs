// pipeline.rs — Pass orchestration and program assembly.
//
// Parses both sources, runs the managed pass, the embedded pass and the
// call-graph pruning over one `CompilerContext`, then concatenates the
// fragments into the three artifacts with the runtime boilerplate.
//
// Preconditions: none.
// Postconditions: artifacts are produced only when no error was reported.
// Failure modes: parse errors (both sources are parsed before failing) and
//   semantic errors (collected across the whole pass before failing).
// Side effects: logs pass timing through `tracing`.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::time::Instant;

use chumsky::error::Rich;
use chumsky::span::SimpleSpan;
use thiserror::Error;
use tracing::{debug, info};

use crate::activity;
use crate::ast::{Program, Tier};
use crate::callgraph::CallGraph;
use crate::config::CompileOptions;
use crate::context::CompilerContext;
use crate::diag::{codes, Diagnostic};
use crate::emit_c;
use crate::emit_js;
use crate::embedded;
use crate::jdata;
use crate::lexer::Token;
use crate::managed;
use crate::parser;
use crate::pass::{descriptor, required_passes, PassId};

// ── Outputs ─────────────────────────────────────────────────────────────────

/// The three generated programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Embedded-tier C program.
    pub embedded: String,
    /// Managed-tier JavaScript program.
    pub managed: String,
    /// Managed-tier program with type annotations on activity signatures.
    pub annotated: String,
}

/// Provenance metadata for `--emit build-info`.
///
/// Hashes are SHA-256 of the raw source texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub embedded_hash: [u8; 32],
    pub managed_hash: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn embedded_hash_hex(&self) -> String {
        bytes_to_hex(&self.embedded_hash)
    }

    pub fn managed_hash_hex(&self) -> String {
        bytes_to_hex(&self.managed_hash)
    }

    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "embedded_hash": self.embedded_hash_hex(),
            "managed_hash": self.managed_hash_hex(),
            "compiler_version": self.compiler_version,
        });
        format!("{:#}\n", value)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(text.as_bytes()).into()
}

pub fn compute_provenance(embedded: &str, managed: &str) -> Provenance {
    Provenance {
        embedded_hash: sha256(embedded),
        managed_hash: sha256(managed),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Everything a successful compilation produces.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// `None` when the pipeline stopped before assembly.
    pub artifacts: Option<Artifacts>,
    /// Final (pruned) call graph.
    pub callgraph: CallGraph,
    /// Activity names of both tiers.
    pub activities: BTreeSet<String>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<Diagnostic>,
    pub provenance: Provenance,
}

/// Compilation failed; no artifacts were produced.
#[derive(Debug, Error)]
#[error("compilation failed during {stage}")]
pub struct PipelineError {
    pub stage: &'static str,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Parsing ─────────────────────────────────────────────────────────────────

fn parse_diagnostic(tier: Tier, err: &Rich<'static, Token, SimpleSpan>) -> Diagnostic {
    Diagnostic::error(*err.span(), err.to_string())
        .with_code(codes::E0001)
        .with_tier(tier)
}

/// Parse both sources. Errors of both are reported together.
pub fn parse_sources(embedded: &str, managed: &str) -> Result<(Program, Program), PipelineError> {
    let mut diagnostics = Vec::new();
    let mut parse = |tier: Tier, source: &str| {
        let result = parser::parse(source, tier);
        diagnostics.extend(result.errors.iter().map(|e| parse_diagnostic(tier, e)));
        result.program
    };
    let managed_program = parse(Tier::Managed, managed);
    let embedded_program = parse(Tier::Embedded, embedded);

    match (embedded_program, managed_program) {
        (Some(e), Some(m)) if diagnostics.is_empty() => Ok((e, m)),
        _ => Err(PipelineError {
            stage: "parse",
            diagnostics,
        }),
    }
}

// ── Pipeline runner ─────────────────────────────────────────────────────────

/// Compile a program to its three artifacts.
pub fn compile(
    embedded: &str,
    managed: &str,
    options: &CompileOptions,
) -> Result<CompileOutput, PipelineError> {
    compile_to(embedded, managed, options, PassId::Assemble)
}

/// Run the minimal set of passes to produce `terminal`.
pub fn compile_to(
    embedded: &str,
    managed: &str,
    options: &CompileOptions,
    terminal: PassId,
) -> Result<CompileOutput, PipelineError> {
    let provenance = compute_provenance(embedded, managed);
    let (embedded_program, managed_program) = parse_sources(embedded, managed)?;

    let mut ctx = CompilerContext::new(options.clone());
    let mut artifacts = None;
    let passes = required_passes(terminal);
    for &pass in &passes {
        let t = Instant::now();
        match pass {
            PassId::Managed => managed::translate(&mut ctx, &managed_program),
            PassId::Embedded => {
                embedded::translate(&mut ctx, &embedded_program);
                warn_unmatched(&mut ctx);
            }
            PassId::Prune => {
                let activities = &ctx.activities;
                ctx.callgraph.prune_managed(|name| activities.is_known(name));
            }
            PassId::Assemble => artifacts = Some(assemble(&ctx)),
        }
        debug!(
            pass = descriptor(pass).name,
            elapsed_ms = t.elapsed().as_secs_f64() * 1000.0,
            "pass complete"
        );
        // The managed pass is followed by the embedded pass regardless so
        // that errors of both tiers are reported together.
        let last = passes.last() == Some(&pass);
        if ctx.has_errors() && (pass != PassId::Managed || last) {
            return Err(PipelineError {
                stage: descriptor(pass).name,
                diagnostics: ctx.diagnostics,
            });
        }
    }

    info!(
        warnings = ctx.diagnostics.len(),
        embedded_edges = ctx.callgraph.edge_count(Tier::Embedded),
        managed_edges = ctx.callgraph.edge_count(Tier::Managed),
        "compiled"
    );
    Ok(CompileOutput {
        artifacts,
        activities: ctx.activities.activity_names(),
        callgraph: ctx.callgraph,
        warnings: ctx.diagnostics,
        provenance,
    })
}

fn warn_unmatched(ctx: &mut CompilerContext) {
    let warnings: Vec<Diagnostic> = ctx
        .activities
        .unmatched()
        .map(|act| {
            Diagnostic::warning(
                act.span,
                format!("activity `{}` has no embedded prototype", act.name),
            )
            .with_code(codes::W0301)
            .with_hint("it is emitted as a plain function and cannot be called from the embedded tier")
            .with_tier(Tier::Managed)
        })
        .collect();
    for warning in warnings {
        ctx.warn(warning);
    }
}

// ── Assembly ────────────────────────────────────────────────────────────────

fn assemble(ctx: &CompilerContext) -> Artifacts {
    let has_jdata = jdata::has_jdata(&ctx.symbols);

    let mut c = vec![emit_c::prelude()];
    c.extend(jdata::c_declarations(&ctx.symbols));
    c.extend(ctx.embedded.c.iter().cloned());
    c.extend(ctx.callbacks.iter().cloned());
    let mut setup = ctx.activities.regcallbacks();
    setup.extend(jdata::c_links(&ctx.symbols));
    c.push(emit_c::user_setup(&setup));
    c.push(emit_c::jam_run_app());
    c.push(emit_c::taskmain(ctx.options.port, ctx.options.stack_size));

    let unmatched: Vec<String> = ctx
        .activities
        .unmatched()
        .map(activity::plain_function)
        .collect();

    Artifacts {
        embedded: finish(c),
        managed: managed_artifact(ctx, has_jdata, &ctx.managed.js, &unmatched, &ctx.embedded.js),
        annotated: managed_artifact(
            ctx,
            has_jdata,
            &ctx.managed.annotated,
            &unmatched,
            &ctx.embedded.annotated,
        ),
    }
}

fn managed_artifact(
    ctx: &CompilerContext,
    has_jdata: bool,
    user: &[String],
    unmatched: &[String],
    stubs: &[String],
) -> String {
    let mut lines = emit_js::requires(&ctx.options, has_jdata);
    lines.push(emit_js::main_open().to_string());
    lines.extend(jdata::js_declarations(&ctx.symbols));
    lines.push(emit_js::jcondition_map().to_string());
    lines.extend(user.iter().cloned());
    lines.extend(unmatched.iter().cloned());
    lines.extend(stubs.iter().cloned());
    lines.push(emit_js::mbox(&ctx.activities.mbox_entries()));
    finish(lines)
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
