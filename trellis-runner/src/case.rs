// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cases and their state machine.
//!
//! A [`Case`] is one invocation of a test method with bound parameters, together with its outcome.
//! Cases start out [`CaseState::NotRun`] and are moved to a terminal state by the lifecycle
//! controller. Transitions are unguarded: calling a transition on a case that is already terminal
//! overwrites the previous outcome.

use crate::errors::DisplayErrorChain;
use itertools::Itertools;
use serde_json::Value;
use std::{any::Any, backtrace::BacktraceStatus, fmt, time::Duration};
use swrite::SWrite;
use thiserror::Error;
use trellis_metadata::{CaseRecord, CompoundFailure, ExceptionInfo};

/// The message used when a lifecycle fails a case without supplying an exception.
pub const MISSING_EXCEPTION_MESSAGE: &str =
    "The custom test class lifecycle did not provide an Exception for this test case failure.";

/// The type name given to exceptions built from plain text.
pub const EXCEPTION_TYPE_NAME: &str = "Exception";

/// The type name given to exceptions converted from panics.
pub const PANIC_TYPE_NAME: &str = "panic";

/// An error raised by a test method, a class instance, or a behavior.
#[derive(Clone, Debug, Error)]
pub enum Exception {
    /// A genuine failure.
    #[error("{0}")]
    Raised(ExceptionInfo),

    /// An internal rethrow wrapper around an original exception.
    ///
    /// Cases never store this variant: [`Case::fail`] unwraps it so that the surfaced type and
    /// stack trace belong to the original failure.
    #[error(transparent)]
    Preserved(Box<Exception>),
}

impl Exception {
    /// Creates an exception from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Raised(ExceptionInfo::new(EXCEPTION_TYPE_NAME, message))
    }

    /// Creates an exception from any error, keeping its type name and chain of causes.
    ///
    /// A backtrace is attached if backtraces are enabled for this process.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut info = ExceptionInfo::new(
            std::any::type_name::<E>(),
            DisplayErrorChain::new(&error).to_string(),
        );
        let backtrace = std::backtrace::Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            info = info.with_stack_trace(backtrace.to_string());
        }
        Self::Raised(info)
    }

    /// Converts a panic payload into an exception.
    ///
    /// A panic raised with an `Exception` payload (through [`std::panic::panic_any`]) is returned
    /// as a preserved wrapper around that exception.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<Exception>() {
            Ok(exception) => Self::Preserved(exception),
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Box<dyn Any>".to_owned()
                };
                Self::Raised(ExceptionInfo::new(PANIC_TYPE_NAME, message))
            }
        }
    }

    /// Attaches the trace recorded where a panic was raised.
    ///
    /// Preserved exceptions keep the trace of the exception they wrap.
    pub(crate) fn with_panic_trace(self, trace: Option<String>) -> Self {
        match (self, trace) {
            (Self::Raised(info), Some(trace)) => Self::Raised(info.with_stack_trace(trace)),
            (exception, _) => exception,
        }
    }

    /// Wraps this exception for rethrowing through the lifecycle.
    pub fn preserve(self) -> Self {
        Self::Preserved(Box::new(self))
    }

    /// Returns true if this is a preserved wrapper.
    pub fn is_preserved(&self) -> bool {
        matches!(self, Self::Preserved(_))
    }

    /// Unwraps any number of preserved wrappers, returning the original failure.
    pub fn into_original(self) -> ExceptionInfo {
        let mut current = self;
        loop {
            match current {
                Self::Raised(info) => return info,
                Self::Preserved(inner) => current = *inner,
            }
        }
    }

    /// Returns the original failure without consuming the exception.
    pub fn original(&self) -> &ExceptionInfo {
        match self {
            Self::Raised(info) => info,
            Self::Preserved(inner) => inner.original(),
        }
    }
}

impl From<ExceptionInfo> for Exception {
    fn from(info: ExceptionInfo) -> Self {
        Self::Raised(info)
    }
}

/// The state of a [`Case`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaseState {
    /// The case has not reached an outcome yet.
    NotRun,

    /// The case was skipped.
    Skipped,

    /// The case passed.
    Passed,

    /// The case failed.
    Failed,
}

impl CaseState {
    /// Returns true for every state other than [`CaseState::NotRun`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotRun)
    }
}

/// One invocation of a test method with bound parameters, plus its outcome.
#[derive(Clone, Debug)]
pub struct Case {
    class: String,
    method: String,
    parameters: Vec<Value>,
    name: String,
    state: CaseState,
    failure: Option<CompoundFailure>,
    skip_reason: Option<String>,
    duration: Duration,
    output: String,
    return_value: Option<Value>,
}

impl Case {
    /// Creates a new case that has not run yet.
    pub fn new(class: impl Into<String>, method: impl Into<String>, parameters: Vec<Value>) -> Self {
        let class = class.into();
        let method = method.into();
        let name = case_name(&class, &method, &parameters);
        Self {
            class,
            method,
            parameters,
            name,
            state: CaseState::NotRun,
            failure: None,
            skip_reason: None,
            duration: Duration::ZERO,
            output: String::new(),
            return_value: None,
        }
    }

    /// The declaring class.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The bound parameter values. Empty for zero-argument methods.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// The display name: `Class.Method`, followed by rendered parameters if there are any.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state.
    pub fn state(&self) -> CaseState {
        self.state
    }

    /// The recorded failure. Present iff the case is failed.
    pub fn failure(&self) -> Option<&CompoundFailure> {
        self.failure.as_ref()
    }

    /// The primary cause of the failure, if the case failed.
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.failure.as_ref().map(|failure| failure.primary())
    }

    /// The reason the case was skipped, if any.
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// How long the case took.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Output captured while the case ran.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// The value returned by the test method, if any.
    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Marks the case as skipped.
    pub fn skip(&mut self, reason: Option<String>) {
        self.state = CaseState::Skipped;
        self.failure = None;
        self.skip_reason = reason;
    }

    /// Marks the case as passed.
    pub fn pass(&mut self) {
        self.state = CaseState::Passed;
        self.failure = None;
        self.skip_reason = None;
    }

    /// Marks the case as failed, replacing any earlier failure.
    ///
    /// Preserved wrappers are unwrapped before the exception is stored. If no exception is
    /// supplied, one is synthesized so that a failed case always carries a cause.
    pub fn fail(&mut self, reason: impl Into<Option<Exception>>) {
        let info = match reason.into() {
            Some(exception) => exception.into_original(),
            None => ExceptionInfo::new(EXCEPTION_TYPE_NAME, MISSING_EXCEPTION_MESSAGE),
        };
        self.state = CaseState::Failed;
        self.skip_reason = None;
        self.failure = Some(CompoundFailure::new(info));
    }

    /// Marks the case as failed with the given reason text.
    pub fn fail_with_reason(&mut self, reason: impl Into<String>) {
        self.fail(Exception::new(reason));
    }

    /// Records an error raised after this case's outcome was decided, typically during teardown or
    /// release.
    ///
    /// A case that already failed keeps its primary cause and gains `reason` as a secondary cause.
    /// Any other case becomes failed with `reason` as its sole cause.
    pub fn fail_secondary(&mut self, reason: Exception) {
        if self.state == CaseState::Failed {
            if let Some(failure) = &mut self.failure {
                failure.push_secondary(reason.into_original());
                return;
            }
        }
        self.fail(reason);
    }

    /// Takes a snapshot of this case for reporting.
    pub fn record(&self) -> CaseRecord {
        CaseRecord {
            class: self.class.clone(),
            method: self.method.clone(),
            name: self.name.clone(),
            duration: self.duration,
            output: self.output.clone(),
        }
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub(crate) fn append_output(&mut self, output: &str) {
        self.output.push_str(output);
    }

    pub(crate) fn set_return_value(&mut self, value: Option<Value>) {
        self.return_value = value;
    }
}

fn case_name(class: &str, method: &str, parameters: &[Value]) -> String {
    if parameters.is_empty() {
        format!("{class}.{method}")
    } else {
        format!("{class}.{method}({})", parameters.iter().join(", "))
    }
}

/// A writer for output produced by a test method while it runs.
///
/// Everything written here is attached to the case and reported with its outcome.
#[derive(Clone, Debug, Default)]
pub struct CaseOutput {
    buf: String,
}

impl CaseOutput {
    /// Creates an empty output buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured text.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Write for CaseOutput {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl SWrite for CaseOutput {
    fn swrite_fmt(&mut self, fmt: fmt::Arguments<'_>) {
        self.buf.swrite_fmt(fmt);
    }

    fn swrite_fmt_nl(&mut self, fmt: fmt::Arguments<'_>) {
        self.buf.swrite_fmt_nl(fmt);
    }
}
