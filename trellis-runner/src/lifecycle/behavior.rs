// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestClass;
use crate::{
    case::{Case, Exception},
    runner::RunContext,
};

/// The state a behavior operates on: one class and its batch of cases.
pub struct ClassContext<'a> {
    class: &'a TestClass,
    run: &'a RunContext,
    cases: &'a mut [Case],
}

impl<'a> ClassContext<'a> {
    pub(crate) fn new(class: &'a TestClass, run: &'a RunContext, cases: &'a mut [Case]) -> Self {
        Self { class, run, cases }
    }

    /// The class being executed.
    pub fn class(&self) -> &'a TestClass {
        self.class
    }

    /// The run-wide context: configuration and convention arguments.
    pub fn run(&self) -> &'a RunContext {
        self.run
    }

    /// The batch of cases for this class, in discovery order.
    pub fn cases(&self) -> &[Case] {
        self.cases
    }

    /// Mutable access to the batch, for behaviors that decide outcomes themselves.
    pub fn cases_mut(&mut self) -> &mut [Case] {
        self.cases
    }
}

/// One wrapping layer around the execution of a class.
///
/// A behavior may do work before or after calling [`Next::proceed`], never call it at all, or
/// return an error. An error returned here is folded into every case of the batch as a secondary
/// failure.
pub trait ClassBehavior {
    /// Runs this layer.
    fn execute(&self, ctx: &mut ClassContext<'_>, next: Next<'_>) -> Result<(), Exception>;
}

impl<F> ClassBehavior for F
where
    F: Fn(&mut ClassContext<'_>, Next<'_>) -> Result<(), Exception>,
{
    fn execute(&self, ctx: &mut ClassContext<'_>, next: Next<'_>) -> Result<(), Exception> {
        self(ctx, next)
    }
}

/// The innermost step of the chain, run once every behavior has proceeded.
pub(crate) trait InnerStep {
    fn run(&self, ctx: &mut ClassContext<'_>) -> Result<(), Exception>;
}

/// The rest of the behavior chain.
pub struct Next<'a> {
    behaviors: &'a [Box<dyn ClassBehavior>],
    inner: &'a dyn InnerStep,
}

impl<'a> Next<'a> {
    pub(crate) fn new(behaviors: &'a [Box<dyn ClassBehavior>], inner: &'a dyn InnerStep) -> Self {
        Self { behaviors, inner }
    }

    /// Invokes the next layer, or the instancing step if this is the innermost behavior.
    pub fn proceed(self, ctx: &mut ClassContext<'_>) -> Result<(), Exception> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => behavior.execute(ctx, Next::new(rest, self.inner)),
            None => self.inner.run(ctx),
        }
    }
}

/// Runs `set_up`, then the rest of the chain, then `tear_down`.
///
/// If `set_up` fails, neither the chain nor `tear_down` runs.
pub struct SetUpTearDown<S, T> {
    set_up: S,
    tear_down: T,
}

impl<S, T> SetUpTearDown<S, T>
where
    S: Fn(&mut ClassContext<'_>) -> Result<(), Exception>,
    T: Fn(&mut ClassContext<'_>) -> Result<(), Exception>,
{
    /// Creates a new `SetUpTearDown` behavior.
    pub fn new(set_up: S, tear_down: T) -> Self {
        Self { set_up, tear_down }
    }
}

impl<S, T> ClassBehavior for SetUpTearDown<S, T>
where
    S: Fn(&mut ClassContext<'_>) -> Result<(), Exception>,
    T: Fn(&mut ClassContext<'_>) -> Result<(), Exception>,
{
    fn execute(&self, ctx: &mut ClassContext<'_>, next: Next<'_>) -> Result<(), Exception> {
        tracing::trace!(class = ctx.class().name(), "running set-up");
        (self.set_up)(ctx)?;
        next.proceed(ctx)?;
        tracing::trace!(class = ctx.class().name(), "running tear-down");
        (self.tear_down)(ctx)
    }
}
