// src/runners/manual.rs
//! Placeholder runner for hand-graded assignments.

use crate::console::{OutputSink, Style};
use crate::errors::Result;
use crate::models::RunnerResult;
use crate::runners::{RunContext, Runner};

/// For assignments an instructor grades by hand. Runs nothing.
pub struct ManualRunner<'a> {
    context: RunContext<'a>,
}

impl<'a> ManualRunner<'a> {
    pub fn new(context: RunContext<'a>) -> Self {
        Self { context }
    }
}

impl Runner for ManualRunner<'_> {
    fn run(&self, output: &mut dyn OutputSink) -> Result<RunnerResult> {
        output.rule(Some(&self.context.assignment.name));
        output.write_line(Style::Heading, "This assignment is manually graded.");

        Ok(self.context.finish(Vec::new()))
    }
}
