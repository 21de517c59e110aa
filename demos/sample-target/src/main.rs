// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A test binary for trying out trellis by hand.
//!
//! Run it directly (`sample-target`), or through the host (`trellis run sample-target`). Pass
//! `-- per-class` to share one calculator across all cases.

use serde_json::{Value, json};
use swrite::{SWrite, swriteln};
use trellis_runner::{
    case::Exception,
    harness,
    lifecycle::{ClassExecution, TestClass},
    runner::{Assembly, RunContext},
};

#[derive(Debug, Default)]
struct Calculator {
    total: i64,
}

fn operand(parameters: &[Value], index: usize) -> Result<i64, Exception> {
    parameters
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| Exception::new(format!("parameter {index} is not an integer")))
}

fn calculator_tests() -> TestClass {
    TestClass::build("CalculatorTests", || Ok(Calculator::default()))
        .method_with(
            "Adds",
            vec![vec![json!(1), json!(2), json!(3)], vec![json!(2), json!(2), json!(5)]],
            |calc: &mut Calculator, parameters, output| -> Result<Value, Exception> {
                let (a, b, expected) = (
                    operand(parameters, 0)?,
                    operand(parameters, 1)?,
                    operand(parameters, 2)?,
                );
                calc.total += a + b;
                swriteln!(output, "{a} + {b} = {}", a + b);
                if a + b != expected {
                    return Err(Exception::new(format!("expected {expected}, got {}", a + b)));
                }
                Ok(json!(a + b))
            },
        )
        .method("StartsAtZero", |calc: &mut Calculator, _| -> Result<(), Exception> {
            if calc.total != 0 {
                return Err(Exception::new(format!(
                    "total is {}; the instance was shared",
                    calc.total
                )));
            }
            Ok(())
        })
        .method("ContinuesFromPreviousCases", |calc: &mut Calculator, _| {
            assert!(calc.total > 0, "nothing has been added to this instance yet");
        })
        .method("SlowMultiplication", |_: &mut Calculator, _| {})
        .build()
}

fn build(ctx: &RunContext) -> Result<(ClassExecution, Assembly), Exception> {
    let mut execution = ClassExecution::new()
        .set_up_tear_down(
            |ctx| {
                eprintln!("setting up {}", ctx.class().name());
                Ok(())
            },
            |ctx| {
                eprintln!("tearing down {}", ctx.class().name());
                Ok(())
            },
        )
        .skip_if(
            |case| case.method().starts_with("Slow"),
            Some("slow tests are skipped"),
        );
    for arg in ctx.convention_args() {
        execution = match arg.as_str() {
            "per-case" => execution.instance_per_case(),
            "per-class" => execution.instance_per_class(),
            other => return Err(Exception::new(format!("unknown convention argument `{other}`"))),
        };
    }

    let assembly = Assembly::new("sample-target").class(calculator_tests());
    Ok((execution, assembly))
}

fn main() {
    harness::main(build)
}
