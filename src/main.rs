//! Purpose: `slicekit` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout; errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::path::PathBuf;

use clap::{error::ErrorKind as ClapErrorKind, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::aot::Shell;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use slicekit::api::{to_exit_code, Error, ErrorKind, SeqView};
use slicekit::script;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(err.to_string().lines().next().unwrap_or("bad usage").to_string())
                    .with_hint("Run slicekit --help for usage."));
            }
        },
    };

    match cli.command {
        Command::Run { manifest } => {
            let summary = script::run_manifest_file(&manifest)?;
            emit(&json!(summary));
            Ok(RunOutcome::ok())
        }
        Command::Demo => {
            demo()?;
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit(&json!({
                "name": "slicekit",
                "version": env!("CARGO_PKG_VERSION"),
                "script_version": script::SCRIPT_VERSION,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "slicekit", &mut std::io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

#[derive(Parser)]
#[command(
    name = "slicekit",
    version,
    about = "Sequence views over shared backing stores",
    long_about = r#"Explore and test view aliasing semantics.

Views share one growable backing store: a write through one view is visible
through every overlapping view, until a capacity-exceeding append moves the
writer onto private storage."#,
    after_help = r#"EXAMPLES
  $ slicekit demo
  $ slicekit run steps.json
  $ slicekit version

LEARN MORE
  $ slicekit <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Execute a JSON step manifest",
        long_about = r#"Execute a JSON step manifest against the view API.

Steps run in order and fail fast. Ops: allocate, make, set, get, append,
reserve, subrange, slice, insert, remove, swap, reverse, clear, extend,
expect_view, expect_shared. A step may carry expect.error to assert that the
operation fails with a given kind."#,
        after_help = r#"EXAMPLES
  $ slicekit run steps.json

NOTES
  - Elements are arbitrary JSON values; the zero value is null.
  - Views live in a per-run namespace keyed by the step's "view" field."#
    )]
    Run {
        #[arg(help = "Path to the manifest JSON file", value_hint = ValueHint::FilePath)]
        manifest: PathBuf,
    },
    #[command(
        about = "Walk through the aliasing contract step by step",
        long_about = r#"Run the canonical aliasing walkthrough and print each state
transition as a JSON line: allocate three elements, derive a subrange, write
through it, then append past capacity to decouple the subrange."#
    )]
    Demo,
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ slicekit completion bash > ~/.local/share/bash-completion/completions/slicekit"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn demo() -> Result<(), Error> {
    let view: SeqView<Value> = SeqView::with_len(3)?;
    for (i, value) in ["a", "b", "c"].iter().enumerate() {
        view.set(i, json!(value))?;
    }
    emit(&json!({
        "step": "allocate",
        "view": "v",
        "elems": view.to_vec(),
        "len": view.len(),
        "capacity": view.capacity(),
    }));

    let mut tail = view.subrange(2)?;
    emit(&json!({
        "step": "subrange",
        "view": "l",
        "start": 2,
        "elems": tail.to_vec(),
        "len": tail.len(),
        "capacity": tail.capacity(),
        "shares_backing": tail.shares_backing(&view),
    }));

    tail.set(0, json!("abc"))?;
    emit(&json!({
        "step": "set",
        "view": "l",
        "index": 0,
        "elems": tail.to_vec(),
        "parent_elems": view.to_vec(),
    }));

    tail.append(json!("d"))?;
    emit(&json!({
        "step": "append",
        "view": "l",
        "elems": tail.to_vec(),
        "capacity": tail.capacity(),
        "shares_backing": tail.shares_backing(&view),
        "parent_elems": view.to_vec(),
    }));

    Ok(())
}

fn emit(value: &Value) {
    println!("{value}");
}

fn emit_error(err: &Error) {
    let mut body = json!({
        "kind": err.kind().label(),
        "message": err.message(),
    });
    if let Some(index) = err.index() {
        body["index"] = json!(index);
    }
    if let Some(length) = err.length() {
        body["length"] = json!(length);
    }
    if let Some(hint) = err.hint() {
        body["hint"] = json!(hint);
    }
    eprintln!("{}", json!({"error": body}));
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
