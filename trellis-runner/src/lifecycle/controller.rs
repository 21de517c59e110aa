// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ClassContext, ClassExecution, InnerStep, Instancing, Next, TestClass, unwind::guarded};
use crate::{
    bus::Bus,
    case::{Case, CaseOutput, CaseState, Exception},
    errors::ListenerError,
    runner::RunContext,
    time::stopwatch,
};
use std::any::Any;
use trellis_metadata::{CaseFailed, CasePassed, CaseSkipped, RunSummary};

/// Runs the cases of one class under a [`ClassExecution`] convention and publishes their outcomes.
///
/// Every error raised by a test method, a class instance or a behavior is absorbed into case
/// outcomes. The only error this returns is a listener failure, which aborts the run.
#[derive(Debug)]
pub struct ClassRunner<'a> {
    execution: &'a ClassExecution,
    run: &'a RunContext,
    bus: &'a Bus,
}

impl<'a> ClassRunner<'a> {
    /// Creates a new `ClassRunner`.
    pub fn new(execution: &'a ClassExecution, run: &'a RunContext, bus: &'a Bus) -> Self {
        Self {
            execution,
            run,
            bus,
        }
    }

    /// The instancing policy in effect: the convention's choice, or the configured default.
    pub fn instancing(&self) -> Instancing {
        self.execution
            .instancing()
            .unwrap_or(self.run.config().execution.instancing)
    }

    /// Runs `cases`, all of which must belong to `class`, and adds their outcomes to `summary`.
    ///
    /// Returns the cases in discovery order with their final outcomes.
    pub fn run(
        &self,
        class: &TestClass,
        cases: Vec<Case>,
        summary: &mut RunSummary,
    ) -> Result<Vec<Case>, ListenerError> {
        let instancing = self.instancing();
        tracing::debug!(
            class = class.name(),
            cases = cases.len(),
            %instancing,
            "running class"
        );

        let mut skipped = Vec::new();
        let mut batch = Vec::with_capacity(cases.len());
        for mut case in cases {
            match self.execution.skip_reason(&case) {
                Some(reason) => {
                    case.skip(reason);
                    skipped.push(case);
                }
                None => batch.push(case),
            }
        }

        for case in &skipped {
            tracing::debug!(case = case.name(), "skipped by rule");
            self.publish(case, summary)?;
        }

        let inner: &dyn InnerStep = match instancing {
            Instancing::PerCase => &PerCase,
            Instancing::PerClass => &PerClass,
        };
        let result = {
            let mut ctx = ClassContext::new(class, self.run, &mut batch);
            guarded(|| Next::new(self.execution.behaviors(), inner).proceed(&mut ctx))
        };

        if let Err(error) = result {
            tracing::debug!(
                class = class.name(),
                error = %error,
                "class lifecycle failed, failing every case in the batch"
            );
            for case in &mut batch {
                case.fail_secondary(error.clone());
            }
        }

        for case in &mut batch {
            if case.state() == CaseState::NotRun {
                case.pass();
            }
            self.publish(case, summary)?;
        }

        let mut cases = skipped;
        cases.extend(batch);
        Ok(cases)
    }

    fn publish(&self, case: &Case, summary: &mut RunSummary) -> Result<(), ListenerError> {
        let record = case.record();
        match case.state() {
            CaseState::Skipped => {
                summary.skipped += 1;
                self.bus.publish(&CaseSkipped {
                    case: record,
                    reason: case.skip_reason().map(str::to_owned),
                })
            }
            CaseState::Failed => {
                summary.failed += 1;
                let failure = case
                    .failure()
                    .cloned()
                    .expect("failed cases always carry a failure");
                self.bus.publish(&CaseFailed {
                    case: record,
                    failure,
                })
            }
            CaseState::Passed | CaseState::NotRun => {
                summary.passed += 1;
                self.bus.publish(&CasePassed { case: record })
            }
        }
    }
}

/// A fresh instance for every case.
struct PerCase;

impl InnerStep for PerCase {
    fn run(&self, ctx: &mut ClassContext<'_>) -> Result<(), Exception> {
        let class = ctx.class();
        for case in ctx.cases_mut() {
            if case.state() == CaseState::Skipped {
                continue;
            }
            let start = stopwatch();
            run_isolated(class, case);
            case.set_duration(start.elapsed());
        }
        Ok(())
    }
}

fn run_isolated(class: &TestClass, case: &mut Case) {
    tracing::trace!(case = case.name(), "constructing instance");
    let mut instance = match guarded(|| class.construct()) {
        Ok(instance) => instance,
        Err(error) => {
            case.fail(error);
            return;
        }
    };

    invoke(class, instance.as_mut(), case);

    tracing::trace!(case = case.name(), "releasing instance");
    if let Err(error) = guarded(|| class.dispose(instance)) {
        case.fail_secondary(error);
    }
}

/// One instance shared by every case of the class.
struct PerClass;

impl InnerStep for PerClass {
    fn run(&self, ctx: &mut ClassContext<'_>) -> Result<(), Exception> {
        let class = ctx.class();
        tracing::trace!(class = class.name(), "constructing shared instance");
        let mut instance = guarded(|| class.construct())?;

        for case in ctx.cases_mut() {
            if case.state() == CaseState::Skipped {
                continue;
            }
            let start = stopwatch();
            invoke(class, instance.as_mut(), case);
            case.set_duration(start.elapsed());
        }

        tracing::trace!(class = class.name(), "releasing shared instance");
        guarded(|| class.dispose(instance))
    }
}

fn invoke(class: &TestClass, instance: &mut dyn Any, case: &mut Case) {
    let Some(binding) = class.binding_for(case) else {
        case.fail_with_reason(format!(
            "class `{}` has no binding for case `{}`",
            class.name(),
            case.name()
        ));
        return;
    };

    tracing::debug!(case = case.name(), "invoking");
    let mut output = CaseOutput::new();
    let result = guarded(|| binding.invoke(instance, &mut output));
    case.append_output(&output.into_string());

    match result {
        Ok(value) => {
            case.set_return_value(value);
            case.pass();
        }
        Err(error) => case.fail(error),
    }
}

