// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ExpectedError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use trellis_metadata::MethodId;
use trellis_runner::{
    output::{Color, OutputContext},
    remote::HostRequest,
};

/// Drives trellis test binaries over the remote control channel.
#[derive(Debug, Parser)]
#[command(name = "trellis", version)]
pub struct TrellisApp {
    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        global = true,
        hide_possible_values = true,
        value_name = "WHEN"
    )]
    color: Color,

    #[command(subcommand)]
    command: Command,
}

impl TrellisApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        OutputContext::init(self.color)
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let (target, request) = match self.command {
            Command::Run {
                target,
                methods,
                deadline,
                target_args,
            } => {
                let request = if methods.is_empty() {
                    HostRequest::RunAssembly
                } else {
                    HostRequest::RunMethods(methods)
                };
                (target.into_session(target_args, deadline), request)
            }
            Command::Discover {
                target,
                target_args,
            } => (
                target.into_session(target_args, None),
                HostRequest::DiscoverMethods,
            ),
        };

        // The bus is single-threaded, so the session runs on a current-thread runtime.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::RuntimeCreateFailed { err })?;
        runtime.block_on(target.run(request, output))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests in a target binary
    Run {
        #[command(flatten)]
        target: TargetOpts,

        /// Methods to run, as `Class.Method` (default: all)
        #[arg(value_name = "METHOD")]
        methods: Vec<MethodId>,

        /// Kill the target and fail the run if it takes longer than this
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        deadline: Option<Duration>,

        /// Arguments passed through to the target's convention
        #[arg(last = true)]
        target_args: Vec<String>,
    },

    /// List the test methods in a target binary without running them
    Discover {
        #[command(flatten)]
        target: TargetOpts,

        /// Arguments passed through to the target's convention
        #[arg(last = true)]
        target_args: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct TargetOpts {
    /// The test binary to run
    #[arg(value_name = "TARGET")]
    target: Utf8PathBuf,

    /// Config file to use, for both the host and the target
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,
}

impl TargetOpts {
    fn into_session(self, target_args: Vec<String>, deadline: Option<Duration>) -> HostSession {
        HostSession {
            target: self.target,
            config: self.config,
            target_args,
            deadline,
        }
    }
}

/// One spawn of a target, serving one request.
#[derive(Debug)]
pub(crate) struct HostSession {
    target: Utf8PathBuf,
    config: Option<Utf8PathBuf>,
    target_args: Vec<String>,
    deadline: Option<Duration>,
}

impl HostSession {
    fn command(&self, channel: &Utf8Path, color: Color) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.target);
        command.arg("--channel").arg(channel).arg(color.to_arg());
        if let Some(config) = &self.config {
            command.arg("--config").arg(config);
        }
        if !self.target_args.is_empty() {
            command.arg("--").args(&self.target_args);
        }
        command.kill_on_drop(true);
        command
    }

    #[cfg(unix)]
    async fn run(self, request: HostRequest, output: OutputContext) -> Result<i32> {
        use camino_tempfile::Utf8TempDir;
        use trellis_metadata::TrellisExitCode;
        use trellis_runner::{
            bus::Bus,
            config::RunnerConfig,
            remote::HostChannel,
            reporter::{ConsoleListener, SummaryListener},
        };

        let config = RunnerConfig::from_sources(self.config.as_deref())?;

        // The socket lives in a fresh directory so its path cannot collide with another session.
        let dir = Utf8TempDir::with_prefix("trellis-")
            .map_err(|err| ExpectedError::TempDirCreateFailed { err })?;
        let channel = HostChannel::bind(&dir.path().join("channel.sock"))
            .map_err(|err| ExpectedError::ChannelBindFailed { err })?;

        let mut child = self
            .command(channel.path(), output.color)
            .spawn()
            .map_err(|err| ExpectedError::TargetSpawnFailed {
                target: self.target.clone(),
                err,
            })?;
        tracing::debug!(binary = %self.target, channel = %channel.path(), "spawned target");

        let connection = tokio::select! {
            connection = channel.accept() => {
                connection.map_err(|err| ExpectedError::SessionFailed { err: err.into() })?
            }
            status = child.wait() => {
                return Err(ExpectedError::TargetExitedEarly {
                    target: self.target,
                    exit_code: status.ok().and_then(|status| status.code()),
                });
            }
        };

        let mut bus = Bus::new();
        if config.reporter.console {
            let mut console = ConsoleListener::new(std::io::stdout(), &config.reporter);
            if output.colorize_stdout() {
                console.colorize();
            }
            bus.subscribe(console);
        }
        let summary = bus.subscribe(SummaryListener::new());

        let discover = request == HostRequest::DiscoverMethods;
        let drive = connection.drive(request, &bus);
        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, drive).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    if let Err(err) = child.kill().await {
                        tracing::warn!(binary = %self.target, "failed to kill target: {err}");
                    }
                    return Err(ExpectedError::DeadlineExceeded {
                        target: self.target,
                        deadline,
                    });
                }
            },
            None => drive.await,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(binary = %self.target, "failed to kill target: {kill_err}");
                }
                return Err(ExpectedError::SessionFailed { err });
            }
        };

        match child.wait().await {
            Ok(status) => tracing::debug!(binary = %self.target, %status, "target exited"),
            Err(err) => tracing::warn!(binary = %self.target, "failed to wait for target: {err}"),
        }

        if let Some(description) = outcome.error {
            return Err(ExpectedError::TargetReportedError { description });
        }
        let exit_code = if discover {
            TrellisExitCode::OK
        } else {
            summary.borrow().exit_code()
        };
        Ok(exit_code)
    }

    #[cfg(not(unix))]
    async fn run(self, _request: HostRequest, _output: OutputContext) -> Result<i32> {
        use trellis_runner::errors::RemoteError;

        Err(ExpectedError::SessionFailed {
            err: RemoteError::Unsupported.into(),
        })
    }
}
