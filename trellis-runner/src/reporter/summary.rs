// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bus::{Handler, Listener, Registry},
    errors::BoxError,
};
use trellis_metadata::{AssemblyCompleted, RunSummary, TrellisExitCode};

/// Records the summary of the most recently completed assembly.
#[derive(Clone, Debug, Default)]
pub struct SummaryListener {
    summary: Option<RunSummary>,
}

impl SummaryListener {
    /// Creates a new `SummaryListener`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last summary received, or `None` if no assembly completed.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// The exit code for the run. A run that never completed is fatal.
    pub fn exit_code(&self) -> i32 {
        self.summary
            .as_ref()
            .map_or(TrellisExitCode::FATAL, TrellisExitCode::from_summary)
    }
}

impl Listener for SummaryListener {
    const NAME: &'static str = "summary";

    fn register(registry: &mut Registry<'_, Self>) {
        registry.handle::<AssemblyCompleted>();
    }
}

impl Handler<AssemblyCompleted> for SummaryListener {
    fn handle(&mut self, message: &AssemblyCompleted) -> Result<(), BoxError> {
        self.summary = Some(message.summary);
        Ok(())
    }
}
