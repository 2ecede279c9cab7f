use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kestrel_core::val::ErrorValue;
use kestrel_core::vm::{decode_program, decode_str};
use kestrel_core::{Runtime, Value};
use serde::Serialize;

#[cfg(test)]
mod main_test;

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "kestrel::load=debug,kestrel::frame=debug,kestrel=info,kestrel_cli=info";

#[derive(Debug, Parser)]
#[command(
    name = "kestrel",
    author,
    version,
    about = "Run serialized kestrel programs",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// If no subcommand, run this program file
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: Option<PathBuf>,

    /// Print a JSON report instead of the bare result
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a program and run it to completion.
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,

        /// Argument for the entry closure. JSON literals are decoded as
        /// program values; anything else is passed as a string.
        #[arg(long = "entry-arg", value_name = "ARG")]
        entry_args: Vec<String>,
    },
    /// Load a program without running it.
    Check {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct TraceLine {
    source: String,
    line: u32,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    kind: String,
    message: String,
    trace: Vec<TraceLine>,
}

impl From<&ErrorValue> for ErrorReport {
    fn from(err: &ErrorValue) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.message().to_string(),
            trace: err
                .trace()
                .into_iter()
                .map(|entry| TraceLine {
                    source: entry.source.to_string(),
                    line: entry.line,
                })
                .collect(),
        }
    }
}

/// Outcome of a run, as printed by `--json`.
#[derive(Debug, Serialize)]
struct RunReport {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
    steps: u64,
    max_queue: usize,
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);

    for comp in p.components() {
        if matches!(comp, Component::ParentDir) {
            return Err(anyhow::anyhow!(
                "Parent directory components ('..') are not allowed in file paths."
            ));
        }
    }

    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Install a stderr subscriber when `KESTREL_TRACE` asks for one.
fn maybe_init_tracing() {
    let raw = match std::env::var("KESTREL_TRACE") {
        Ok(value) => value,
        Err(_) => return,
    };

    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = filter_expr_from(&raw).or_else(|| std::env::var("RUST_LOG").ok());

        let builder = fmt().with_writer(std::io::stderr);

        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };

        let _ = builder.try_init();
    });
}

fn new_runtime() -> anyhow::Result<Runtime> {
    let rt = Runtime::new();
    kestrel_stdlib::register_prelude(&rt)?;
    Ok(rt)
}

fn load_program(rt: &Runtime, path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    decode_str(rt, &text).with_context(|| format!("failed to load {}", path.display()))
}

fn parse_entry_arg(rt: &Runtime, raw: &str) -> anyhow::Result<Value> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => decode_program(rt, &json).with_context(|| format!("invalid entry argument {raw:?}")),
        Err(_) => Ok(Value::from(raw)),
    }
}

fn run_file(path: &Path, entry_args: &[String], json: bool) -> anyhow::Result<ExitCode> {
    let rt = new_runtime()?;
    let program = load_program(&rt, path)?;
    let args = entry_args
        .iter()
        .map(|raw| parse_entry_arg(&rt, raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let result = match program {
        Value::Closure(_) => rt.run(program, args)?,
        other if args.is_empty() => other,
        other => anyhow::bail!("{} is not a function; it takes no entry arguments", other.kind_name()),
    };
    tracing::info!(
        target: "kestrel_cli",
        steps = rt.scheduler().steps(),
        max_queue = rt.scheduler().high_water(),
        "program finished"
    );

    let error = match &result {
        Value::Error(err) => Some(err.clone()),
        _ => None,
    };
    if json {
        let report = RunReport {
            ok: error.is_none(),
            value: error.is_none().then(|| result.to_string()),
            error: error.as_deref().map(ErrorReport::from),
            steps: rt.scheduler().steps(),
            max_queue: rt.scheduler().high_water(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(err) = &error {
        eprintln!("Error: {}: {}", err.kind(), err.message());
        for entry in err.trace() {
            eprintln!("  at {}:{}", entry.source, entry.line);
        }
    } else {
        println!("{result}");
    }
    Ok(if error.is_some() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn check_file(path: &Path) -> anyhow::Result<ExitCode> {
    let rt = new_runtime()?;
    let program = load_program(&rt, path)?;
    println!("ok: {} loads as {}", path.display(), program.kind_name());
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    maybe_init_tracing();

    let CliArgs { command, file, json } = CliArgs::parse();

    match (command, file) {
        (Some(Commands::Run { file, entry_args }), _) => run_file(&file, &entry_args, json),
        (Some(Commands::Check { file }), _) => check_file(&file),
        (None, Some(file)) => run_file(&file, &[], json),
        (None, None) => anyhow::bail!("no program given; try `kestrel run FILE` or `kestrel --help`"),
    }
}
