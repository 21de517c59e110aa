// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{cell::RefCell, rc::Rc};
use swrite::{SWrite, swrite};
use trellis_metadata::{
    AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped, MethodDiscovered,
    RunSummary,
};
use trellis_runner::{
    bus::{Bus, Handler, Listener, Registry},
    case::Exception,
    errors::{BoxError, ListenerError},
    lifecycle::{ClassExecution, TestClass},
    runner::{Assembly, AssemblyRunner, RunContext},
};

/// A shared log of lifecycle steps, in the order they happened.
pub(crate) type Trace = Rc<RefCell<Vec<String>>>;

pub(crate) fn trace_of(trace: &Trace) -> Vec<String> {
    trace.borrow().clone()
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SampleOptions {
    pub(crate) fail_construct: bool,
    pub(crate) fail_dispose: bool,
}

pub(crate) struct Sample {
    trace: Trace,
    fail_dispose: bool,
}

/// A class with a passing and a failing method that records every lifecycle step.
pub(crate) fn sample_class(trace: &Trace, options: SampleOptions) -> TestClass {
    let ctor_trace = trace.clone();
    TestClass::build("SampleTestClass", move || {
        ctor_trace.borrow_mut().push(".ctor".to_owned());
        if options.fail_construct {
            return Err(Exception::new("'.ctor' failed!"));
        }
        Ok(Sample {
            trace: ctor_trace.clone(),
            fail_dispose: options.fail_dispose,
        })
    })
    .method("Pass", |sample: &mut Sample, output| {
        sample.trace.borrow_mut().push("Pass".to_owned());
        swrite!(output, "Pass");
    })
    .method("Fail", |sample: &mut Sample, _| -> Result<(), Exception> {
        sample.trace.borrow_mut().push("Fail".to_owned());
        Err(Exception::new("'Fail' failed!"))
    })
    .dispose_with(|sample: Sample| {
        sample.trace.borrow_mut().push("Dispose".to_owned());
        if sample.fail_dispose {
            return Err(Exception::new("'Dispose' failed!"));
        }
        Ok(())
    })
    .build()
}

/// Renders case events as one line each.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) events: Vec<String>,
}

impl Listener for Recorder {
    const NAME: &'static str = "recorder";

    fn register(registry: &mut Registry<'_, Self>) {
        registry
            .handle::<AssemblyStarted>()
            .handle::<MethodDiscovered>()
            .handle::<CaseSkipped>()
            .handle::<CasePassed>()
            .handle::<CaseFailed>()
            .handle::<AssemblyCompleted>();
    }
}

impl Handler<AssemblyStarted> for Recorder {
    fn handle(&mut self, message: &AssemblyStarted) -> Result<(), BoxError> {
        self.events.push(format!("Started {}", message.assembly));
        Ok(())
    }
}

impl Handler<MethodDiscovered> for Recorder {
    fn handle(&mut self, message: &MethodDiscovered) -> Result<(), BoxError> {
        self.events.push(format!("Discovered {}", message.method));
        Ok(())
    }
}

impl Handler<CaseSkipped> for Recorder {
    fn handle(&mut self, message: &CaseSkipped) -> Result<(), BoxError> {
        let mut line = format!("Skipped {}", message.case.name);
        if let Some(reason) = &message.reason {
            swrite!(line, ": {reason}");
        }
        self.events.push(line);
        Ok(())
    }
}

impl Handler<CasePassed> for Recorder {
    fn handle(&mut self, message: &CasePassed) -> Result<(), BoxError> {
        self.events.push(format!("Passed {}", message.case.name));
        Ok(())
    }
}

impl Handler<CaseFailed> for Recorder {
    fn handle(&mut self, message: &CaseFailed) -> Result<(), BoxError> {
        self.events
            .push(format!("Failed {}: {}", message.case.name, message.failure));
        Ok(())
    }
}

impl Handler<AssemblyCompleted> for Recorder {
    fn handle(&mut self, message: &AssemblyCompleted) -> Result<(), BoxError> {
        let RunSummary {
            passed,
            failed,
            skipped,
            ..
        } = message.summary;
        self.events.push(format!(
            "Completed {}: {passed} passed, {failed} failed, {skipped} skipped",
            message.assembly
        ));
        Ok(())
    }
}

/// Runs every class under `execution`, returning the case events only.
pub(crate) fn run_classes(
    execution: &ClassExecution,
    classes: Vec<TestClass>,
) -> Result<(Vec<String>, RunSummary), ListenerError> {
    let assembly = classes
        .into_iter()
        .fold(Assembly::new("sample"), Assembly::class);
    let mut bus = Bus::new();
    let recorder = bus.subscribe(Recorder::default());
    let context = RunContext::default();

    let summary = AssemblyRunner::new(execution, &context, &bus).run_assembly(&assembly)?;

    let events = recorder
        .borrow()
        .events
        .iter()
        .filter(|event| !event.starts_with("Started") && !event.starts_with("Completed"))
        .cloned()
        .collect();
    Ok((events, summary))
}
