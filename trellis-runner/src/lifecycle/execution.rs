// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ClassBehavior, ClassContext, Next, SetUpTearDown};
use crate::case::{Case, Exception};
use serde::Deserialize;
use std::fmt;

/// How instances of a test class are created for its cases.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Instancing {
    /// A fresh instance for every case, released before the next case starts.
    #[default]
    PerCase,

    /// One instance shared by every case of the class, released after the last case.
    PerClass,
}

impl fmt::Display for Instancing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerCase => write!(f, "per-case"),
            Self::PerClass => write!(f, "per-class"),
        }
    }
}

pub(crate) struct SkipRule {
    predicate: Box<dyn Fn(&Case) -> bool>,
    reason: Option<String>,
}

impl SkipRule {
    pub(crate) fn reason_for(&self, case: &Case) -> Option<Option<String>> {
        (self.predicate)(case).then(|| self.reason.clone())
    }
}

/// The convention for how classes execute: an instancing policy, an ordered list of behaviors, and
/// skip rules.
///
/// A `ClassExecution` is configured once before a run and is not changed afterwards. Behaviors
/// nest in registration order: the first one registered is the outermost layer.
#[derive(Default)]
pub struct ClassExecution {
    instancing: Option<Instancing>,
    behaviors: Vec<Box<dyn ClassBehavior>>,
    skip_rules: Vec<SkipRule>,
}

impl ClassExecution {
    /// Creates a convention with no behaviors, no skip rules, and the configured instancing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh instance for every case.
    pub fn instance_per_case(mut self) -> Self {
        self.instancing = Some(Instancing::PerCase);
        self
    }

    /// Shares one instance across every case of a class.
    pub fn instance_per_class(mut self) -> Self {
        self.instancing = Some(Instancing::PerClass);
        self
    }

    /// Adds a behavior written as a closure.
    pub fn wrap<F>(self, behavior: F) -> Self
    where
        F: Fn(&mut ClassContext<'_>, Next<'_>) -> Result<(), Exception> + 'static,
    {
        self.wrap_behavior(behavior)
    }

    /// Adds a behavior.
    pub fn wrap_behavior(mut self, behavior: impl ClassBehavior + 'static) -> Self {
        self.behaviors.push(Box::new(behavior));
        self
    }

    /// Adds a behavior that runs `set_up` before and `tear_down` after the rest of the chain.
    pub fn set_up_tear_down<S, T>(self, set_up: S, tear_down: T) -> Self
    where
        S: Fn(&mut ClassContext<'_>) -> Result<(), Exception> + 'static,
        T: Fn(&mut ClassContext<'_>) -> Result<(), Exception> + 'static,
    {
        self.wrap_behavior(SetUpTearDown::new(set_up, tear_down))
    }

    /// Skips every case matching `predicate`, with an optional reason.
    pub fn skip_if<P>(mut self, predicate: P, reason: Option<&str>) -> Self
    where
        P: Fn(&Case) -> bool + 'static,
    {
        self.skip_rules.push(SkipRule {
            predicate: Box::new(predicate),
            reason: reason.map(str::to_owned),
        });
        self
    }

    /// The instancing policy chosen by this convention, if any.
    pub fn instancing(&self) -> Option<Instancing> {
        self.instancing
    }

    pub(crate) fn behaviors(&self) -> &[Box<dyn ClassBehavior>] {
        &self.behaviors
    }

    /// Returns the skip reason for the first matching rule, or `None` if no rule matches.
    pub(crate) fn skip_reason(&self, case: &Case) -> Option<Option<String>> {
        self.skip_rules.iter().find_map(|rule| rule.reason_for(case))
    }
}

impl fmt::Debug for ClassExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassExecution")
            .field("instancing", &self.instancing)
            .field("behaviors", &self.behaviors.len())
            .field("skip_rules", &self.skip_rules.len())
            .finish()
    }
}
