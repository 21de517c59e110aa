// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use trellis_metadata::{CasePassed, TrellisExitCode};
use trellis_runner::{
    bus::{Bus, Handler, Listener, Registry},
    case::{CaseState, Exception},
    errors::BoxError,
    lifecycle::{ClassExecution, ClassRunner, TestClass},
    runner::{Assembly, AssemblyRunner, RunContext},
};

fn set_up_tear_down(trace: &Trace, fail_set_up: bool, fail_tear_down: bool) -> ClassExecution {
    let set_up_trace = trace.clone();
    let tear_down_trace = trace.clone();
    ClassExecution::new().set_up_tear_down(
        move |_| {
            set_up_trace.borrow_mut().push("SetUp".to_owned());
            if fail_set_up {
                return Err(Exception::new("'SetUp' failed!"));
            }
            Ok(())
        },
        move |_| {
            tear_down_trace.borrow_mut().push("TearDown".to_owned());
            if fail_tear_down {
                return Err(Exception::new("'TearDown' failed!"));
            }
            Ok(())
        },
    )
}

#[test]
fn per_case_instancing_isolates_cases() {
    let trace = Trace::default();
    let (events, summary) = run_classes(
        &ClassExecution::new().instance_per_case(),
        vec![sample_class(&trace, SampleOptions::default())],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Passed SampleTestClass.Pass",
            "Failed SampleTestClass.Fail: 'Fail' failed!",
        ]
    );
    assert_eq!(
        trace_of(&trace),
        [".ctor", "Pass", "Dispose", ".ctor", "Fail", "Dispose"]
    );
    assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 0));
}

#[test]
fn tear_down_failures_become_secondary_failures() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &set_up_tear_down(&trace, false, true).instance_per_case(),
        vec![sample_class(&trace, SampleOptions::default())],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: 'TearDown' failed!",
            "Failed SampleTestClass.Fail: 'Fail' failed!\n    Secondary Failure: 'TearDown' failed!",
        ]
    );
    assert_eq!(
        trace_of(&trace),
        [
            "SetUp", ".ctor", "Pass", "Dispose", ".ctor", "Fail", "Dispose", "TearDown"
        ]
    );
}

#[test]
fn short_circuiting_behavior_passes_every_case_without_running_them() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &ClassExecution::new().wrap(|_, _| Ok(())),
        vec![sample_class(&trace, SampleOptions::default())],
    )
    .unwrap();

    assert_eq!(
        events,
        ["Passed SampleTestClass.Pass", "Passed SampleTestClass.Fail"]
    );
    assert!(trace_of(&trace).is_empty(), "nothing was constructed or invoked");
}

#[test]
fn set_up_failure_skips_the_chain_and_tear_down() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &set_up_tear_down(&trace, true, false),
        vec![sample_class(&trace, SampleOptions::default())],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: 'SetUp' failed!",
            "Failed SampleTestClass.Fail: 'SetUp' failed!",
        ]
    );
    assert_eq!(trace_of(&trace), ["SetUp"]);
}

#[test]
fn per_case_construct_failure_affects_only_that_case() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &ClassExecution::new().instance_per_case(),
        vec![sample_class(
            &trace,
            SampleOptions {
                fail_construct: true,
                ..Default::default()
            },
        )],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: '.ctor' failed!",
            "Failed SampleTestClass.Fail: '.ctor' failed!",
        ]
    );
    assert_eq!(trace_of(&trace), [".ctor", ".ctor"]);
}

#[test]
fn per_case_dispose_failure_is_folded_into_each_case() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &ClassExecution::new().instance_per_case(),
        vec![sample_class(
            &trace,
            SampleOptions {
                fail_dispose: true,
                ..Default::default()
            },
        )],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: 'Dispose' failed!",
            "Failed SampleTestClass.Fail: 'Fail' failed!\n    Secondary Failure: 'Dispose' failed!",
        ]
    );
}

#[test]
fn per_class_instancing_shares_one_instance() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &ClassExecution::new().instance_per_class(),
        vec![sample_class(&trace, SampleOptions::default())],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Passed SampleTestClass.Pass",
            "Failed SampleTestClass.Fail: 'Fail' failed!",
        ]
    );
    assert_eq!(trace_of(&trace), [".ctor", "Pass", "Fail", "Dispose"]);
}

#[test]
fn per_class_construct_failure_fails_every_case_identically() {
    let trace = Trace::default();
    let (events, summary) = run_classes(
        &ClassExecution::new().instance_per_class(),
        vec![sample_class(
            &trace,
            SampleOptions {
                fail_construct: true,
                ..Default::default()
            },
        )],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: '.ctor' failed!",
            "Failed SampleTestClass.Fail: '.ctor' failed!",
        ]
    );
    assert_eq!(trace_of(&trace), [".ctor"]);
    assert_eq!(summary.failed, 2);
}

#[test]
fn per_class_dispose_failure_is_folded_into_every_case() {
    let trace = Trace::default();
    let (events, _) = run_classes(
        &ClassExecution::new().instance_per_class(),
        vec![sample_class(
            &trace,
            SampleOptions {
                fail_dispose: true,
                ..Default::default()
            },
        )],
    )
    .unwrap();

    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: 'Dispose' failed!",
            "Failed SampleTestClass.Fail: 'Fail' failed!\n    Secondary Failure: 'Dispose' failed!",
        ]
    );
}

#[test]
fn first_registered_behavior_is_outermost() {
    let trace = Trace::default();
    let (outer, inner) = (trace.clone(), trace.clone());
    let execution = ClassExecution::new()
        .wrap(move |ctx, next| {
            outer.borrow_mut().push("outer before".to_owned());
            next.proceed(ctx)?;
            outer.borrow_mut().push("outer after".to_owned());
            Ok(())
        })
        .wrap(move |ctx, next| {
            inner.borrow_mut().push("inner before".to_owned());
            next.proceed(ctx)?;
            inner.borrow_mut().push("inner after".to_owned());
            Ok(())
        });

    run_classes(&execution, vec![sample_class(&trace, SampleOptions::default())]).unwrap();

    assert_eq!(
        trace_of(&trace),
        [
            "outer before",
            "inner before",
            ".ctor",
            "Pass",
            "Dispose",
            ".ctor",
            "Fail",
            "Dispose",
            "inner after",
            "outer after",
        ]
    );
}

#[test]
fn behavior_errors_after_proceed_are_secondary() {
    let trace = Trace::default();
    let execution = ClassExecution::new().wrap(|ctx, next| {
        next.proceed(ctx)?;
        Err(Exception::new("behavior failed"))
    });

    let (events, _) =
        run_classes(&execution, vec![sample_class(&trace, SampleOptions::default())]).unwrap();
    assert_eq!(
        events,
        [
            "Failed SampleTestClass.Pass: behavior failed",
            "Failed SampleTestClass.Fail: 'Fail' failed!\n    Secondary Failure: behavior failed",
        ]
    );
}

#[test]
fn behaviors_can_decide_outcomes() {
    let trace = Trace::default();
    let execution = ClassExecution::new().wrap(|ctx, next| {
        assert_eq!(ctx.class().name(), "SampleTestClass");
        assert_eq!(ctx.cases().len(), 2);
        next.proceed(ctx)?;
        // Last write wins: the behavior overrides the outcome the method produced.
        for case in ctx.cases_mut() {
            if case.state() == CaseState::Failed {
                case.skip(Some("known failure".to_owned()));
            }
        }
        Ok(())
    });

    let (events, summary) =
        run_classes(&execution, vec![sample_class(&trace, SampleOptions::default())]).unwrap();
    assert_eq!(
        events,
        [
            "Passed SampleTestClass.Pass",
            "Skipped SampleTestClass.Fail: known failure",
        ]
    );
    assert_eq!(summary.skipped, 1);
}

#[test]
fn skip_rules_report_skips_first_and_never_run_them() {
    let trace = Trace::default();
    let execution = ClassExecution::new()
        .skip_if(|case| case.method() == "Fail", Some("flaky"))
        .instance_per_case();

    let (events, summary) =
        run_classes(&execution, vec![sample_class(&trace, SampleOptions::default())]).unwrap();
    assert_eq!(
        events,
        [
            "Skipped SampleTestClass.Fail: flaky",
            "Passed SampleTestClass.Pass",
        ]
    );
    assert_eq!(trace_of(&trace), [".ctor", "Pass", "Dispose"]);
    assert_eq!(TrellisExitCode::from_summary(&summary), TrellisExitCode::OK);
}

#[test]
fn panics_fail_the_case() {
    let class = TestClass::build("Panicky", || Ok(()))
        .method("Asserts", |_: &mut (), _| std::assert_eq!(1 + 1, 3, "math is broken"))
        .method("Throws", |_: &mut (), _| -> Result<(), Exception> {
            std::panic::panic_any(Exception::new("thrown as a payload"))
        })
        .build();

    let (events, summary) = run_classes(&ClassExecution::new(), vec![class]).unwrap();
    assert_eq!(summary.failed, 2);
    assert!(
        events[0].starts_with("Failed Panicky.Asserts: assertion `left == right` failed: math is broken"),
        "{events:?}"
    );
    assert_eq!(events[1], "Failed Panicky.Throws: thrown as a payload");
}

#[test]
fn panics_record_where_they_were_raised() {
    let asserts_line = line!() + 2;
    let class = TestClass::build("Panicky", || Ok(()))
        .method("Asserts", |_: &mut (), _| assert_eq!(1 + 1, 3, "math is broken"))
        .build();

    let context = RunContext::default();
    let bus = Bus::new();
    let execution = ClassExecution::new();
    let mut summary = Default::default();
    let cases = ClassRunner::new(&execution, &context, &bus)
        .run(&class, class.cases(|_| true), &mut summary)
        .unwrap();

    let exception = cases[0].exception().expect("the case failed");
    assert_eq!(exception.type_name, "panic");
    let stack_trace = exception.stack_trace.as_deref().unwrap_or_default();
    assert!(
        stack_trace.starts_with(&format!("at {}:{asserts_line}:", file!())),
        "stack trace: {stack_trace}"
    );
}

#[test]
fn parameterized_methods_record_return_values() {
    let class = TestClass::build("Calculator", || Ok(0_i64))
        .method_with(
            "Adds",
            vec![vec![json!(1), json!(2)], vec![json!(5), json!(-3)]],
            |total: &mut i64, parameters, _| -> Result<Value, Exception> {
                let sum: i64 = parameters.iter().filter_map(Value::as_i64).sum();
                *total += sum;
                Ok(json!(*total))
            },
        )
        .build();

    let context = RunContext::default();
    let bus = Bus::new();
    let execution = ClassExecution::new().instance_per_class();
    let runner = ClassRunner::new(&execution, &context, &bus);
    let mut summary = Default::default();
    let cases = runner
        .run(&class, class.cases(|_| true), &mut summary)
        .unwrap();

    let names: Vec<_> = cases.iter().map(|case| case.name()).collect();
    assert_eq!(names, ["Calculator.Adds(1, 2)", "Calculator.Adds(5, -3)"]);
    let values: Vec<_> = cases.iter().map(|case| case.return_value().cloned()).collect();
    assert_eq!(values, [Some(json!(3)), Some(json!(5))]);
    assert!(cases.iter().all(|case| case.state() == CaseState::Passed));
}

#[test]
fn captured_output_is_attached_to_cases() {
    let trace = Trace::default();
    let class = sample_class(&trace, SampleOptions::default());
    let context = RunContext::default();
    let bus = Bus::new();
    let execution = ClassExecution::new();
    let mut summary = Default::default();
    let cases = ClassRunner::new(&execution, &context, &bus)
        .run(&class, class.cases(|method| method == "Pass"), &mut summary)
        .unwrap();
    assert_eq!(cases[0].output(), "Pass");
}

#[test]
fn run_methods_selects_by_class_and_method() {
    let trace = Trace::default();
    let assembly = Assembly::new("sample").class(sample_class(&trace, SampleOptions::default()));
    let mut bus = Bus::new();
    let recorder = bus.subscribe(Recorder::default());
    let context = RunContext::default();
    let execution = ClassExecution::new();

    let summary = AssemblyRunner::new(&execution, &context, &bus)
        .run_methods(
            &assembly,
            &["SampleTestClass.Fail".parse().unwrap(), "Other.Pass".parse().unwrap()],
        )
        .unwrap();

    assert_eq!(
        recorder.borrow().events,
        [
            "Started sample",
            "Failed SampleTestClass.Fail: 'Fail' failed!",
            "Completed sample: 0 passed, 1 failed, 0 skipped",
        ]
    );
    assert_eq!(
        TrellisExitCode::from_summary(&summary),
        TrellisExitCode::TESTS_FAILED
    );
}

#[test]
fn discovery_runs_nothing() {
    let trace = Trace::default();
    let assembly = Assembly::new("sample").class(sample_class(&trace, SampleOptions::default()));
    let mut bus = Bus::new();
    let recorder = bus.subscribe(Recorder::default());
    let context = RunContext::default();
    let execution = ClassExecution::new();

    let count = AssemblyRunner::new(&execution, &context, &bus)
        .discover_methods(&assembly)
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        recorder.borrow().events,
        [
            "Discovered SampleTestClass.Pass",
            "Discovered SampleTestClass.Fail"
        ]
    );
    assert!(trace_of(&trace).is_empty());
}

#[test]
fn empty_assemblies_are_fatal() {
    let (events, summary) = run_classes(&ClassExecution::new(), Vec::new()).unwrap();
    assert!(events.is_empty());
    assert_eq!(
        TrellisExitCode::from_summary(&summary),
        TrellisExitCode::FATAL
    );
}

struct FailOnPass;

impl Listener for FailOnPass {
    const NAME: &'static str = "fail-on-pass";

    fn register(registry: &mut Registry<'_, Self>) {
        registry.handle::<CasePassed>();
    }
}

impl Handler<CasePassed> for FailOnPass {
    fn handle(&mut self, _: &CasePassed) -> Result<(), BoxError> {
        Err("disk full".into())
    }
}

#[test]
fn listener_failures_abort_the_run() {
    let first = Trace::default();
    let second = Trace::default();
    let assembly = Assembly::new("sample")
        .class(sample_class(&first, SampleOptions::default()))
        .class(sample_class(&second, SampleOptions::default()));
    let mut bus = Bus::new();
    bus.subscribe(FailOnPass);
    let context = RunContext::default();
    let execution = ClassExecution::new();

    let err = AssemblyRunner::new(&execution, &context, &bus)
        .run_assembly(&assembly)
        .unwrap_err();
    assert_eq!(err.listener(), "fail-on-pass");
    assert_eq!(err.message_type(), "CasePassed");
    assert!(trace_of(&second).is_empty(), "the run stops at the first error");
}
