// src/runners/unit.rs
//! In-process grading with registered suites.

use crate::console::{OutputSink, Style};
use crate::environment::scoped_test_environment;
use crate::errors::Result;
use crate::grading::{Outcome, SuiteRegistry, run_assessment, with_quiet_panics};
use crate::models::{RunnerResult, TestCaseResult};
use crate::privilege::scoped_privilege_elevation;
use crate::runners::{RunContext, Runner, Tally, announce, display_results, report_case};

/// Grades in-process with the suites registered under the assignment's
/// script key.
pub struct UnitRunner<'a> {
    context: RunContext<'a>,
    suites: &'a SuiteRegistry,
}

impl<'a> UnitRunner<'a> {
    pub fn new(context: RunContext<'a>, suites: &'a SuiteRegistry) -> Self {
        Self { context, suites }
    }
}

impl Runner for UnitRunner<'_> {
    fn run(&self, output: &mut dyn OutputSink) -> Result<RunnerResult> {
        let assignment = self.context.assignment;
        let suites = self.suites.suites_for(&assignment.test.filename)?;

        let mut test_case_results = Vec::new();
        let mut tally = Tally::default();

        {
            let _identity = scoped_privilege_elevation()?;
            let _environment = scoped_test_environment(&self.context.files)?;

            with_quiet_panics(|| {
                for suite in suites {
                    log::debug!("running suite {} ({} assessments)", suite.name(), suite.assessments().len());
                    output.rule(Some(&assignment.name));

                    for assessment in suite.assessments() {
                        announce(output, &assessment.name);

                        let (was_successful, verdict, detail) = match run_assessment(assessment) {
                            Outcome::Success => (true, None, None),
                            Outcome::Failure(detail) => (false, Some("Failed!"), Some(detail)),
                            Outcome::Error(detail) => (false, Some("Error!"), Some(detail)),
                            Outcome::Inconclusive(reason) => {
                                output.write_line(Style::Emphasis, &format!("No result: {}", reason));
                                continue;
                            }
                        };

                        let result = TestCaseResult::new(
                            assessment.name.clone(),
                            was_successful,
                            assessment.points,
                            assessment.hint.clone(),
                        );
                        report_case(output, &result, verdict);
                        if let Some(detail) = detail {
                            output.plain(&detail);
                        }

                        tally.record(&result);
                        test_case_results.push(result);
                    }
                }
            });
        }

        display_results(output, assignment, &tally);
        log::info!(
            "{} earned {}/{} on {}",
            self.context.user.name, tally.earned_points, assignment.total_points, assignment.name
        );

        Ok(self.context.finish(test_case_results))
    }
}
