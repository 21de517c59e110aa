// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running an assembly of test classes.
//!
//! An [`Assembly`] is the discovery collaborator: the test binary builds it with its classes and
//! method bindings already resolved. The [`AssemblyRunner`] walks it class by class, in order, and
//! hands each class to a [`ClassRunner`].

use crate::{
    bus::Bus,
    config::RunnerConfig,
    errors::ListenerError,
    lifecycle::{ClassExecution, ClassRunner, TestClass},
    time::stopwatch,
};
use trellis_metadata::{AssemblyCompleted, AssemblyStarted, MethodDiscovered, MethodId, RunSummary};

/// Context shared by every class in a run: configuration and convention arguments.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    config: RunnerConfig,
    convention_args: Vec<String>,
}

impl RunContext {
    /// Creates a new `RunContext`.
    pub fn new(config: RunnerConfig, convention_args: Vec<String>) -> Self {
        Self {
            config,
            convention_args,
        }
    }

    /// The configuration for this run.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Free-form arguments passed through to the convention.
    pub fn convention_args(&self) -> &[String] {
        &self.convention_args
    }
}

/// A named, ordered collection of test classes.
#[derive(Debug)]
pub struct Assembly {
    name: String,
    classes: Vec<TestClass>,
}

impl Assembly {
    /// Creates an empty assembly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Adds a class after every existing class.
    pub fn class(mut self, class: TestClass) -> Self {
        self.classes.push(class);
        self
    }

    /// The assembly name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The classes, in discovery order.
    pub fn classes(&self) -> &[TestClass] {
        &self.classes
    }

    /// Every candidate method, in discovery order, without duplicates.
    pub fn methods(&self) -> Vec<MethodId> {
        self.classes
            .iter()
            .flat_map(|class| {
                class
                    .method_names()
                    .map(|method| MethodId::new(class.name(), method))
            })
            .collect()
    }
}

/// Runs assemblies under a convention, publishing events to a bus.
#[derive(Debug)]
pub struct AssemblyRunner<'a> {
    execution: &'a ClassExecution,
    context: &'a RunContext,
    bus: &'a Bus,
}

impl<'a> AssemblyRunner<'a> {
    /// Creates a new `AssemblyRunner`.
    pub fn new(execution: &'a ClassExecution, context: &'a RunContext, bus: &'a Bus) -> Self {
        Self {
            execution,
            context,
            bus,
        }
    }

    /// Publishes a [`MethodDiscovered`] event for every candidate method. No case executes.
    ///
    /// Returns the number of methods discovered.
    pub fn discover_methods(&self, assembly: &Assembly) -> Result<usize, ListenerError> {
        let methods = assembly.methods();
        tracing::debug!(
            assembly = assembly.name(),
            count = methods.len(),
            "discovering methods"
        );
        for method in &methods {
            self.bus.publish(&MethodDiscovered {
                method: method.clone(),
            })?;
        }
        Ok(methods.len())
    }

    /// Runs every case in the assembly.
    pub fn run_assembly(&self, assembly: &Assembly) -> Result<RunSummary, ListenerError> {
        self.run_matching(assembly, |_, _| true)
    }

    /// Runs every case of the given methods, in discovery order.
    ///
    /// Methods not present in the assembly are ignored.
    pub fn run_methods(
        &self,
        assembly: &Assembly,
        methods: &[MethodId],
    ) -> Result<RunSummary, ListenerError> {
        self.run_matching(assembly, |class, method| {
            methods
                .iter()
                .any(|id| id.class() == class && id.method() == method)
        })
    }

    fn run_matching(
        &self,
        assembly: &Assembly,
        selected: impl Fn(&str, &str) -> bool,
    ) -> Result<RunSummary, ListenerError> {
        let start = stopwatch();
        self.bus.publish(&AssemblyStarted {
            assembly: assembly.name().to_owned(),
            timestamp: start.start_time(),
        })?;

        let class_runner = ClassRunner::new(self.execution, self.context, self.bus);
        let mut summary = RunSummary::default();
        for class in assembly.classes() {
            let cases = class.cases(|method| selected(class.name(), method));
            if cases.is_empty() {
                continue;
            }
            class_runner.run(class, cases, &mut summary)?;
        }
        summary.duration = start.elapsed();

        tracing::debug!(
            assembly = assembly.name(),
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "assembly completed"
        );
        self.bus.publish(&AssemblyCompleted {
            assembly: assembly.name().to_owned(),
            summary,
        })?;
        Ok(summary)
    }
}
