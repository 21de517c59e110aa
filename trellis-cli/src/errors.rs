// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::{error::Error, time::Duration};
use thiserror::Error;
use trellis_metadata::TrellisExitCode;
use trellis_runner::{
    errors::{ConfigParseError, RemoteError, RunError},
    output::{NO_HEADING_TARGET, StderrStyles},
};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them.

/// An error that ends a host session abnormally.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("failed to create async runtime")]
    RuntimeCreateFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to create temporary directory")]
    TempDirCreateFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to bind host channel")]
    ChannelBindFailed {
        #[source]
        err: RemoteError,
    },
    #[error("failed to spawn target")]
    TargetSpawnFailed {
        target: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("target exited before connecting")]
    TargetExitedEarly {
        target: Utf8PathBuf,
        exit_code: Option<i32>,
    },
    #[error("deadline exceeded")]
    DeadlineExceeded {
        target: Utf8PathBuf,
        deadline: Duration,
    },
    #[error("remote session failed")]
    SessionFailed {
        #[source]
        err: RunError,
    },
    #[error("target reported an error")]
    TargetReportedError { description: String },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    ///
    /// Every expected error is fatal: none of them are test failures.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::RuntimeCreateFailed { .. }
            | Self::ConfigParseError { .. }
            | Self::TempDirCreateFailed { .. }
            | Self::ChannelBindFailed { .. }
            | Self::TargetSpawnFailed { .. }
            | Self::TargetExitedEarly { .. }
            | Self::DeadlineExceeded { .. }
            | Self::SessionFailed { .. }
            | Self::TargetReportedError { .. } => TrellisExitCode::FATAL,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::RuntimeCreateFailed { err } => {
                tracing::error!("failed to create async runtime");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TempDirCreateFailed { err } => {
                tracing::error!("failed to create temporary directory for the host channel");
                Some(err as &dyn Error)
            }
            Self::ChannelBindFailed { err } => {
                tracing::error!("failed to bind host channel");
                Some(err as &dyn Error)
            }
            Self::TargetSpawnFailed { target, err } => {
                tracing::error!("failed to spawn target `{}`", target.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::TargetExitedEarly { target, exit_code } => {
                let with_code_str = match exit_code {
                    Some(code) => format!(" with code {}", code.style(styles.bold)),
                    None => String::new(),
                };
                tracing::error!(
                    "target `{}` exited{} before connecting to the host channel",
                    target.style(styles.bold),
                    with_code_str,
                );
                None
            }
            Self::DeadlineExceeded { target, deadline } => {
                tracing::error!(
                    "target `{}` did not complete within {}, and was killed",
                    target.style(styles.bold),
                    humantime::format_duration(*deadline).style(styles.bold),
                );
                None
            }
            Self::SessionFailed { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TargetReportedError { description } => {
                tracing::error!("target reported an error: {description}");
                None
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
