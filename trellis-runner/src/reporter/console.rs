// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bus::{Handler, Listener, Registry},
    config::{OutputDisplay, ReporterConfig},
    errors::BoxError,
};
use owo_colors::{OwoColorize, Style};
use std::io::Write;
use swrite::{SWrite, swrite};
use trellis_metadata::{
    AssemblyCompleted, AssemblyStarted, CaseFailed, CasePassed, CaseSkipped, MethodDiscovered,
    RunSummary,
};

/// Prints human-readable results to a writer, typically stdout.
pub struct ConsoleListener<W> {
    writer: W,
    styles: Styles,
    failure_output: OutputDisplay,
    success_output: OutputDisplay,
}

impl<W: Write> ConsoleListener<W> {
    /// Creates a console listener with the given reporter settings.
    pub fn new(writer: W, config: &ReporterConfig) -> Self {
        Self {
            writer,
            styles: Styles::default(),
            failure_output: config.failure_output,
            success_output: config.success_output,
        }
    }

    /// Colors the output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_output(&mut self, output: &str) -> std::io::Result<()> {
        if output.is_empty() {
            return Ok(());
        }
        writeln!(self.writer, "{}", "--- output ---".style(self.styles.output))?;
        write!(self.writer, "{output}")?;
        if !output.ends_with('\n') {
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

impl<W: Write + 'static> Listener for ConsoleListener<W> {
    const NAME: &'static str = "console";

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

impl<W: Write> Handler<AssemblyStarted> for ConsoleListener<W> {
    fn handle(&mut self, message: &AssemblyStarted) -> Result<(), BoxError> {
        writeln!(
            self.writer,
            "------ Testing Assembly {} ------",
            message.assembly.style(self.styles.count)
        )?;
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> Handler<MethodDiscovered> for ConsoleListener<W> {
    fn handle(&mut self, message: &MethodDiscovered) -> Result<(), BoxError> {
        writeln!(self.writer, "{}", message.method)?;
        Ok(())
    }
}

impl<W: Write> Handler<CaseSkipped> for ConsoleListener<W> {
    fn handle(&mut self, message: &CaseSkipped) -> Result<(), BoxError> {
        write!(
            self.writer,
            "Test '{}' {}",
            message.case.name,
            "skipped".style(self.styles.skip)
        )?;
        if let Some(reason) = &message.reason {
            write!(self.writer, ": {reason}")?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> Handler<CasePassed> for ConsoleListener<W> {
    fn handle(&mut self, message: &CasePassed) -> Result<(), BoxError> {
        if self.success_output.is_immediate() {
            writeln!(
                self.writer,
                "Test '{}' {}",
                message.case.name,
                "passed".style(self.styles.pass)
            )?;
            self.write_output(&message.case.output)?;
        }
        Ok(())
    }
}

impl<W: Write> Handler<CaseFailed> for ConsoleListener<W> {
    fn handle(&mut self, message: &CaseFailed) -> Result<(), BoxError> {
        writeln!(
            self.writer,
            "Test '{}' {}: {}",
            message.case.name,
            "failed".style(self.styles.fail),
            message.failure.display_name()
        )?;
        writeln!(self.writer, "{}", message.failure.compound_stack_trace())?;
        if self.failure_output.is_immediate() {
            self.write_output(&message.case.output)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> Handler<AssemblyCompleted> for ConsoleListener<W> {
    fn handle(&mut self, message: &AssemblyCompleted) -> Result<(), BoxError> {
        let line = summary_line(&message.summary, &self.styles);
        writeln!(self.writer, "{line}")?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn summary_line(summary: &RunSummary, styles: &Styles) -> String {
    if summary.total() == 0 {
        return "No tests found.".to_owned();
    }

    let mut line = String::new();
    swrite!(
        line,
        "{} {}, {} {}",
        summary.passed.style(styles.count),
        "passed".style(styles.pass),
        summary.failed.style(styles.count),
        "failed".style(styles.fail),
    );
    if summary.skipped > 0 {
        swrite!(
            line,
            ", {} {}",
            summary.skipped.style(styles.count),
            "skipped".style(styles.skip)
        );
    }
    swrite!(line, ", took {:.2} seconds", summary.duration.as_secs_f64());
    line
}

#[derive(Clone, Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    output: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.output = Style::new().magenta();
    }
}
