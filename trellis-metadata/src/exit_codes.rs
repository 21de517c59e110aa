// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::RunSummary;

/// Documented exit codes for trellis target processes.
///
/// A direct (non-remote) run distinguishes "tests failed" from "nothing ran": a run that executed
/// zero cases is fatal, not successful.
pub enum TrellisExitCode {}

impl TrellisExitCode {
    /// Every executed case passed and at least one case executed.
    pub const OK: i32 = 0;

    /// One or more cases failed, and the run was non-empty.
    pub const TESTS_FAILED: i32 = 1;

    /// Zero cases ran, or a protocol or construction error occurred.
    pub const FATAL: i32 = -1;

    /// Computes the exit code for a completed run.
    pub fn from_summary(summary: &RunSummary) -> i32 {
        if summary.total() == 0 {
            Self::FATAL
        } else if summary.failed > 0 {
            Self::TESTS_FAILED
        } else {
            Self::OK
        }
    }
}
