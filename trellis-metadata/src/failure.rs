// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use swrite::{SWrite, swrite};

/// A snapshot of an error raised while running a case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExceptionInfo {
    /// The name of the error type, for example `std::io::Error` or `panic`.
    pub type_name: String,

    /// The rendered error message.
    pub message: String,

    /// The captured stack trace, if one was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ExceptionInfo {
    /// Creates a new `ExceptionInfo` without a stack trace.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attaches a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExceptionInfo {}

/// The failure recorded against a case: the first cause, followed by any errors raised later
/// during teardown or release.
///
/// The primary cause always renders first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompoundFailure {
    primary: ExceptionInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    secondary: Vec<ExceptionInfo>,
}

impl CompoundFailure {
    /// Creates a failure with a single primary cause.
    pub fn new(primary: ExceptionInfo) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    /// Appends a secondary cause.
    pub fn push_secondary(&mut self, secondary: ExceptionInfo) {
        self.secondary.push(secondary);
    }

    /// The primary cause.
    pub fn primary(&self) -> &ExceptionInfo {
        &self.primary
    }

    /// Secondary causes, in the order they were raised.
    pub fn secondary(&self) -> &[ExceptionInfo] {
        &self.secondary
    }

    /// The name shown for this failure: the primary cause's type.
    pub fn display_name(&self) -> &str {
        &self.primary.type_name
    }

    /// Renders every cause with its stack trace, primary first.
    pub fn compound_stack_trace(&self) -> String {
        let mut out = String::new();
        write_with_trace(&mut out, &self.primary);
        for secondary in &self.secondary {
            swrite!(
                out,
                "\n\n===== Secondary Exception: {} =====\n",
                secondary.type_name
            );
            write_with_trace(&mut out, secondary);
        }
        out
    }
}

fn write_with_trace(out: &mut String, info: &ExceptionInfo) {
    out.push_str(&info.message);
    if let Some(trace) = &info.stack_trace {
        out.push('\n');
        out.push_str(trace.trim_end());
    }
}

impl fmt::Display for CompoundFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary.message)?;
        for secondary in &self.secondary {
            write!(f, "\n    Secondary Failure: {}", secondary.message)?;
        }
        Ok(())
    }
}
