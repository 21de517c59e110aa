// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by trellis.
//!
//! Case-level failures are never represented here: they are absorbed into case outcomes. These
//! types cover the errors that abort a run or a process.

use crate::case::Exception;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// A boxed error returned by a listener's handler.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// An error returned by a listener while handling a message.
///
/// Listener errors are never isolated: the first one aborts the rest of the run.
#[derive(Debug, Error)]
#[error("listener `{listener}` failed to handle `{message_type}`")]
pub struct ListenerError {
    listener: &'static str,
    message_type: &'static str,
    #[source]
    err: BoxError,
}

impl ListenerError {
    /// Creates a new `ListenerError`.
    pub fn new(listener: &'static str, message_type: &'static str, err: impl Into<BoxError>) -> Self {
        Self {
            listener,
            message_type,
            err: err.into(),
        }
    }

    /// The name of the listener that failed.
    pub fn listener(&self) -> &'static str {
        self.listener
    }

    /// The wire name of the message being handled.
    pub fn message_type(&self) -> &'static str {
        self.message_type
    }
}

/// An error that occurred on the remote control channel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    /// Connecting to or binding the channel failed.
    #[error("failed to open channel `{channel}`")]
    Open {
        /// The channel name.
        channel: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Reading from or writing to the channel failed.
    #[error("I/O error on remote channel")]
    Io(#[from] std::io::Error),

    /// A frame exceeded the maximum allowed size.
    #[error("frame of {len} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge {
        /// The size of the frame.
        len: usize,

        /// The maximum size allowed.
        max: usize,
    },

    /// A frame could not be serialized or deserialized.
    #[error("failed to process `{message_type}` message")]
    Json {
        /// The message type being processed.
        message_type: String,

        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },

    /// The peer sent a message type that is not valid at this point in the exchange.
    #[error("received unexpected message of type {message_type}: {body}")]
    UnexpectedMessage {
        /// The wire type name received.
        message_type: String,

        /// The body of the message.
        body: String,
    },

    /// The channel closed before the exchange was complete.
    #[error("remote channel closed before a `Completed` message was received")]
    ChannelClosed,

    /// Remote control is not supported on this platform.
    #[error("remote control channels are not supported on this platform")]
    Unsupported,
}

/// An error that occurred while reading trellis configuration.
#[derive(Debug, Error)]
#[error("failed to parse trellis config{}", .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default())]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// The config file being read, or `None` for the built-in defaults.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

/// A process-level error that ends a run abnormally.
///
/// This is distinct from any case outcome: it is reported once, with the fatal exit code.
#[derive(Debug, Error)]
pub enum RunError {
    /// The convention or assembly could not be constructed.
    #[error("failed to construct the test convention")]
    Convention(#[source] Exception),

    /// A listener failed, aborting the run.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// The remote control channel failed.
    #[error("remote control failed")]
    Remote(#[from] RemoteError),

    /// Configuration could not be read.
    #[error(transparent)]
    Config(#[from] ConfigParseError),
}

/// Displays an error together with its chain of causes.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut next_error = self.error.source();
        if next_error.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(err) = next_error {
            write!(f, "\n  - {err}")?;
            next_error = err.source();
        }

        Ok(())
    }
}
