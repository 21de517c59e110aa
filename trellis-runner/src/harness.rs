// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entry point for test binaries.
//!
//! A test binary calls [`main`] with a function that builds its convention and assembly:
//!
//! ```no_run
//! use trellis_runner::{
//!     harness,
//!     lifecycle::{ClassExecution, TestClass},
//!     runner::Assembly,
//! };
//!
//! fn main() {
//!     harness::main(|_ctx| {
//!         let assembly = Assembly::new("sample").class(
//!             TestClass::build("Math", || Ok(()))
//!                 .method("Adds", |_: &mut (), _| assert_eq!(1 + 1, 2))
//!                 .build(),
//!         );
//!         Ok((ClassExecution::new(), assembly))
//!     })
//! }
//! ```
//!
//! With `--channel <PATH>`, the binary connects to a host and serves one request. Otherwise it
//! runs directly and prints results to the console.

use crate::{
    bus::Bus,
    case::Exception,
    config::RunnerConfig,
    errors::{DisplayErrorChain, RunError},
    lifecycle::ClassExecution,
    output::{Color, OutputContext},
    remote::{self, TargetSession},
    reporter::{ConsoleListener, SummaryListener},
    runner::{Assembly, AssemblyRunner, RunContext},
};
use camino::Utf8PathBuf;
use clap::Parser;
use owo_colors::OwoColorize;
use trellis_metadata::{MethodId, TrellisExitCode};

/// Command-line arguments accepted by every test binary.
#[derive(Debug, Parser)]
#[command(about = "Runs the tests in this binary")]
pub struct HarnessArgs {
    /// Connect to a host on this channel and serve one request
    #[arg(long, value_name = "PATH")]
    pub channel: Option<Utf8PathBuf>,

    /// Config file to layer over the defaults
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Do not print results to the console
    #[arg(long)]
    pub no_console: bool,

    /// List test methods instead of running them
    #[arg(long, conflicts_with = "channel")]
    pub list: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        value_name = "WHEN"
    )]
    pub color: Color,

    /// Methods to run, as `Class.Method` (default: all)
    #[arg(value_name = "METHOD")]
    pub methods: Vec<MethodId>,

    /// Arguments passed through to the convention
    #[arg(last = true)]
    pub convention_args: Vec<String>,
}

/// Parses arguments from the environment, runs, and exits the process with the run's exit code.
///
/// `build` creates the convention and assembly. A failure there is fatal: no case runs.
pub fn main<F>(build: F) -> !
where
    F: FnOnce(&RunContext) -> Result<(ClassExecution, Assembly), Exception>,
{
    let code = exec(HarnessArgs::parse(), build);
    std::process::exit(code)
}

/// Runs with the given arguments and returns the exit code.
pub fn exec<F>(args: HarnessArgs, build: F) -> i32
where
    F: FnOnce(&RunContext) -> Result<(ClassExecution, Assembly), Exception>,
{
    let output = OutputContext::init(args.color);
    match &args.channel {
        Some(channel) => exec_remote(channel.clone(), &args, build, output),
        None => exec_direct(&args, build, output).unwrap_or_else(|error| {
            report_fatal(&error, output);
            TrellisExitCode::FATAL
        }),
    }
}

fn exec_remote<F>(channel: Utf8PathBuf, args: &HarnessArgs, build: F, output: OutputContext) -> i32
where
    F: FnOnce(&RunContext) -> Result<(ClassExecution, Assembly), Exception>,
{
    let channel = match remote::connect(&channel) {
        Ok(channel) => channel,
        Err(error) => {
            report_fatal(&RunError::Remote(error), output);
            return TrellisExitCode::FATAL;
        }
    };
    let session = TargetSession::new(channel);

    let context = match load_context(args) {
        Ok(context) => context,
        Err(error) => return session.fail(error),
    };
    match build(&context) {
        Ok((execution, assembly)) => session.serve(&execution, &context, &assembly),
        Err(exception) => session.fail(RunError::Convention(exception)),
    }
}

fn exec_direct<F>(args: &HarnessArgs, build: F, output: OutputContext) -> Result<i32, RunError>
where
    F: FnOnce(&RunContext) -> Result<(ClassExecution, Assembly), Exception>,
{
    let context = load_context(args)?;
    let (execution, assembly) = build(&context).map_err(RunError::Convention)?;

    let mut bus = Bus::new();
    if context.config().reporter.console && !args.no_console {
        let mut console = ConsoleListener::new(std::io::stdout(), &context.config().reporter);
        if output.colorize_stdout() {
            console.colorize();
        }
        bus.subscribe(console);
    }
    let summary = bus.subscribe(SummaryListener::new());

    let runner = AssemblyRunner::new(&execution, &context, &bus);
    if args.list {
        runner.discover_methods(&assembly)?;
        return Ok(TrellisExitCode::OK);
    }
    if args.methods.is_empty() {
        runner.run_assembly(&assembly)?;
    } else {
        runner.run_methods(&assembly, &args.methods)?;
    }

    let exit_code = summary.borrow().exit_code();
    Ok(exit_code)
}

fn load_context(args: &HarnessArgs) -> Result<RunContext, RunError> {
    let config = RunnerConfig::from_sources(args.config.as_deref())?;
    Ok(RunContext::new(config, args.convention_args.clone()))
}

fn report_fatal(error: &RunError, output: OutputContext) {
    let styles = output.stderr_styles();
    eprintln!(
        "{}: {}",
        "Fatal Error".style(styles.fatal),
        DisplayErrorChain::new(error)
    );
}
