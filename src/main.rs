//! Thin CLI layer: parse args, styled output, and call into parmap-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod builtins;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use parmap_core::{progress, worker, Backend, RunOptions, Runner};
use serde_json::Value;
use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal() && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn warning(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.yellow());
    } else {
        eprintln!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Log to stderr; stdout carries results (and the worker protocol).
fn init_logging() {
    let filter = EnvFilter::try_from_env("PARMAP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn cli() -> Command {
    Command::new("parmap")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Bhuvan Prakash <bhuvanstark6@gmail.com>")
        .about("Parallel map over a thread or process pool")
        .after_help(
            "Examples:\n  parmap run square 1 2 3 4\n  parmap run add '[1,2]' '[3,4]' --backend process\n  parmap run delay '[300,\"slow\"]' '[10,\"fast\"]' --stream\n  parmap list",
        )
        .subcommand(
            Command::new("run")
                .about("Apply a built-in function to every item")
                .arg(
                    Arg::new("func")
                        .required(true)
                        .help("Function name (see `parmap list`)"),
                )
                .arg(
                    Arg::new("item")
                        .num_args(0..)
                        .help("Input items as JSON; arrays are spread as arguments, other text is a string"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_parser(clap::value_parser!(usize))
                        .help("Worker count (default: CPU count, or PARMAP_WORKERS)"),
                )
                .arg(
                    Arg::new("backend")
                        .short('b')
                        .long("backend")
                        .value_parser(["thread", "process"])
                        .help("Worker kind (default: thread, or PARMAP_BACKEND)"),
                )
                .arg(
                    Arg::new("progress")
                        .long("progress")
                        .action(ArgAction::SetTrue)
                        .help("Show a progress bar on stderr"),
                )
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .action(ArgAction::SetTrue)
                        .help("Print each result as soon as it completes, one JSON value per line"),
                )
                .arg(
                    Arg::new("in-flight")
                        .long("in-flight")
                        .value_parser(clap::value_parser!(usize))
                        .help("With --stream: max tasks submitted but not yet printed (default: 2 x workers)"),
                ),
        )
        .subcommand(Command::new("list").about("List built-in functions"))
        .subcommand(
            Command::new("worker")
                .about("Serve built-in functions over stdin/stdout")
                .hide(true),
        )
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_item(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// rc file and env first, then flags.
fn run_options(sub: &ArgMatches) -> Result<RunOptions, String> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut options = RunOptions::from_env_and_config(&cwd);
    if let Some(&n) = sub.get_one::<usize>("workers") {
        options = options.workers(n);
    }
    if let Some(name) = sub.get_one::<String>("backend") {
        options = options.backend(name.parse::<Backend>().map_err(|e| e.to_string())?);
    }
    if sub.get_flag("progress") {
        if !progress::available() {
            warning("Built without the `progress` feature; --progress has no effect.");
        }
        options = options.progress(true);
    }
    if let Some(&n) = sub.get_one::<usize>("in-flight") {
        options = options.in_flight(n);
    }
    Ok(options)
}

fn run_func(sub: &ArgMatches) -> Result<(), String> {
    let func = sub
        .get_one::<String>("func")
        .ok_or("Missing function name.")?
        .as_str();
    let items: Vec<Value> = sub
        .get_many::<String>("item")
        .map(|it| it.map(|s| parse_item(s)).collect())
        .unwrap_or_default();
    let options = run_options(sub)?;
    tracing::debug!(func, items = items.len(), ?options, "run");

    let runner = Runner::new(builtins::registry());
    if sub.get_flag("stream") {
        let stream = runner
            .run_parallel_stream::<_, Value, _>(func, items, &options)
            .map_err(|e| e.to_string())?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for result in stream {
            let value = result.map_err(|e| e.to_string())?;
            writeln!(out, "{}", value).map_err(|e| e.to_string())?;
        }
    } else {
        let values: Vec<Value> = runner
            .run_parallel_list(func, items, &options)
            .map_err(|e| e.to_string())?;
        println!("{}", Value::Array(values));
    }
    Ok(())
}

fn serve_worker() -> Result<(), String> {
    let served = worker::serve_stdio(&builtins::registry()).map_err(|e| e.to_string())?;
    tracing::debug!(served, "worker done");
    Ok(())
}

fn run() -> Result<(), String> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run_func(sub)?,
        Some(("list", _)) => {
            for name in builtins::registry().names() {
                println!("{}", name);
            }
        }
        Some(("worker", _)) => serve_worker()?,
        _ => {
            if use_color() {
                println!("{}", "parmap".bright_cyan().bold());
            } else {
                println!("parmap");
            }
            dim("Parallel map over a thread or process pool.");
            dim("\nRun `parmap --help` for details.");
        }
    }

    Ok(())
}

fn main() {
    init_logging();

    // Spawned by a process pool: speak the worker protocol and nothing else.
    if worker::is_worker() {
        let code = match serve_worker() {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(error = %e, "worker failed");
                1
            }
        };
        std::process::exit(code);
    }

    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
