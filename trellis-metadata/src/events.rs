// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution events published on the bus and streamed to remote hosts.

use crate::{CompoundFailure, Message, MethodId};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A snapshot of a case at the time its outcome was reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseRecord {
    /// The declaring class.
    pub class: String,

    /// The method name.
    pub method: String,

    /// The display name, including rendered parameters.
    pub name: String,

    /// How long the case took to run.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Output captured while the case ran.
    #[serde(default)]
    pub output: String,
}

impl CaseRecord {
    /// The identifier of the method this case invoked.
    pub fn method_id(&self) -> MethodId {
        MethodId::new(&self.class, &self.method)
    }
}

/// Aggregate counts for a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
    /// The number of cases that passed.
    pub passed: usize,

    /// The number of cases that failed.
    pub failed: usize,

    /// The number of cases that were skipped.
    pub skipped: usize,

    /// Wall-clock time for the whole run.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl RunSummary {
    /// The total number of cases reported.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// A run over an assembly started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStarted {
    /// The name of the assembly.
    pub assembly: String,

    /// When the run started.
    pub timestamp: DateTime<FixedOffset>,
}

impl Message for AssemblyStarted {
    const TYPE_NAME: &'static str = "AssemblyStarted";
}

/// A candidate test method was found during discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDiscovered {
    /// The method that was found.
    pub method: MethodId,
}

impl Message for MethodDiscovered {
    const TYPE_NAME: &'static str = "MethodDiscovered";
}

/// A case was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSkipped {
    /// The skipped case.
    pub case: CaseRecord,

    /// Why the case was skipped, if a reason was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Message for CaseSkipped {
    const TYPE_NAME: &'static str = "CaseSkipped";
}

/// A case passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePassed {
    /// The case that passed.
    pub case: CaseRecord,
}

impl Message for CasePassed {
    const TYPE_NAME: &'static str = "CasePassed";
}

/// A case failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFailed {
    /// The case that failed.
    pub case: CaseRecord,

    /// The primary cause and any secondary causes.
    pub failure: CompoundFailure,
}

impl Message for CaseFailed {
    const TYPE_NAME: &'static str = "CaseFailed";
}

/// A run over an assembly completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyCompleted {
    /// The name of the assembly.
    pub assembly: String,

    /// Counts for the run.
    pub summary: RunSummary,
}

impl Message for AssemblyCompleted {
    const TYPE_NAME: &'static str = "AssemblyCompleted";
}
