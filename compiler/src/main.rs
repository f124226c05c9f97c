use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use jamc::ast::Tier;
use jamc::config::CompileOptions;
use jamc::diag::Diagnostic;
use jamc::pass::PassId;
use jamc::pipeline::{self, CompileOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Write the three artifacts into the output directory
    All,
    C,
    Js,
    Annotated,
    Callgraph,
    Dot,
    Ast,
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "jamc",
    version,
    about = "JAM cross-compiler: splits a JAM program into an embedded C program and a managed JavaScript program"
)]
struct Cli {
    /// Embedded-tier (JAM-C) source file
    embedded: PathBuf,

    /// Managed-tier (JAM-JS) source file
    managed: PathBuf,

    /// Output directory for `--emit all`
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::All)]
    emit: EmitStage,

    /// JSON file with compile options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Broker port passed to `jam_init`
    #[arg(long)]
    port: Option<u16>,

    /// Stack size of the embedded tasks
    #[arg(long)]
    stack_size: Option<u32>,

    /// Directory of the managed runtime modules
    #[arg(long)]
    runtime_dir: Option<String>,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

struct Sources {
    embedded: String,
    managed: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = match load_options(&cli) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("jamc: error: {}", e);
            std::process::exit(2);
        }
    };
    debug!(?options, "compile options");

    let sources = Sources {
        embedded: read_source(&cli.embedded),
        managed: read_source(&cli.managed),
    };

    if cli.emit == EmitStage::Ast {
        match pipeline::parse_sources(&sources.embedded, &sources.managed) {
            Ok((embedded, managed)) => {
                println!("{:#?}", embedded);
                println!("{:#?}", managed);
            }
            Err(e) => fail(&cli, &sources, &e.diagnostics),
        }
        return;
    }

    let terminal = match cli.emit {
        EmitStage::Callgraph | EmitStage::Dot => PassId::Prune,
        _ => PassId::Assemble,
    };
    let output =
        match pipeline::compile_to(&sources.embedded, &sources.managed, &options, terminal) {
            Ok(o) => o,
            Err(e) => fail(&cli, &sources, &e.diagnostics),
        };
    report(&cli, &sources, &output.warnings);

    if let Err(e) = emit(&cli, &output) {
        eprintln!("jamc: error: {}", e);
        std::process::exit(2);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "jamc=debug" } else { "jamc=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file first, then command-line overrides.
fn load_options(cli: &Cli) -> Result<CompileOptions, jamc::config::ConfigError> {
    let mut options = match &cli.config {
        Some(path) => CompileOptions::load(path)?,
        None => CompileOptions::default(),
    };
    if let Some(port) = cli.port {
        options.port = port;
    }
    if let Some(stack_size) = cli.stack_size {
        options.stack_size = stack_size;
    }
    if let Some(dir) = &cli.runtime_dir {
        options.runtime_dir = dir.clone();
    }
    Ok(options)
}

fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("jamc: error: {}: {}", path.display(), e);
            std::process::exit(2);
        }
    }
}

fn report(cli: &Cli, sources: &Sources, diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        match diag.tier {
            Some(Tier::Embedded) => print_located(&cli.embedded, &sources.embedded, diag),
            Some(Tier::Managed) => print_located(&cli.managed, &sources.managed, diag),
            None => eprintln!("jamc: {}", diag),
        }
    }
}

fn print_located(path: &Path, source: &str, diag: &Diagnostic) {
    let (line, col) = diag.location(source);
    eprintln!("{}:{}:{}: {}", path.display(), line, col, diag);
}

fn fail(cli: &Cli, sources: &Sources, diagnostics: &[Diagnostic]) -> ! {
    report(cli, sources, diagnostics);
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    eprintln!("jamc: {} error(s), no output written", errors);
    std::process::exit(1);
}

fn emit(cli: &Cli, output: &CompileOutput) -> std::io::Result<()> {
    match cli.emit {
        EmitStage::Callgraph => {
            let json = output.callgraph.to_json().map_err(std::io::Error::other)?;
            println!("{}", json);
        }
        EmitStage::Dot => {
            print!(
                "{}",
                jamc::dot::emit_dot(&output.callgraph, &output.activities)
            );
        }
        EmitStage::BuildInfo => print!("{}", output.provenance.to_json()),
        EmitStage::Ast => {}
        EmitStage::All | EmitStage::C | EmitStage::Js | EmitStage::Annotated => {
            let Some(artifacts) = &output.artifacts else {
                return Ok(());
            };
            match cli.emit {
                EmitStage::C => print!("{}", artifacts.embedded),
                EmitStage::Js => print!("{}", artifacts.managed),
                EmitStage::Annotated => print!("{}", artifacts.annotated),
                _ => write_artifacts(&cli.output, artifacts)?,
            }
        }
    }
    Ok(())
}

fn write_artifacts(dir: &Path, artifacts: &pipeline::Artifacts) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, text) in [
        ("jamout.c", &artifacts.embedded),
        ("jamout.js", &artifacts.managed),
        ("jamout.annotated.js", &artifacts.annotated),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, text)?;
        info!(path = %path.display(), bytes = text.len(), "wrote artifact");
    }
    Ok(())
}
