// src/runners/mod.rs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{Assignment, Course};
use crate::console::{OutputSink, Style};
use crate::errors::{CourseworkError, Result};
use crate::grading::SuiteRegistry;
use crate::models::{RunnerResult, TestCaseResult};
use crate::user::User;

pub mod cmd;
pub mod manual;
pub mod unit;

pub use cmd::CmdRunner;
pub use manual::ManualRunner;
pub use unit::UnitRunner;

/// A strategy for grading one submission.
///
/// Implementations stream progress to the sink as it happens and hand back
/// the full result once every case has been graded.
pub trait Runner {
    fn run(&self, output: &mut dyn OutputSink) -> Result<RunnerResult>;
}

/// Everything a runner needs to know about the submission it grades.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub user: &'a User,
    pub course: &'a Course,
    pub assignment: &'a Assignment,
    pub files: Vec<PathBuf>,
}

impl<'a> RunContext<'a> {
    pub fn new(user: &'a User, course: &'a Course, assignment: &'a Assignment, files: Vec<PathBuf>) -> Self {
        Self { user, course, assignment, files }
    }

    fn finish(&self, test_case_results: Vec<TestCaseResult>) -> RunnerResult {
        RunnerResult::new(self.user, self.course, self.assignment, test_case_results)
    }
}

/// The runner variants, by their config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Cmd,
    Unit,
    Manual,
}

impl RunnerKind {
    pub fn key(self) -> &'static str {
        match self {
            RunnerKind::Cmd => "cmd",
            RunnerKind::Unit => "py",
            RunnerKind::Manual => "manual",
        }
    }

    pub fn build<'a>(self, context: RunContext<'a>, suites: &'a SuiteRegistry) -> Box<dyn Runner + 'a> {
        match self {
            RunnerKind::Cmd => Box::new(CmdRunner::new(context)),
            RunnerKind::Unit => Box::new(UnitRunner::new(context, suites)),
            RunnerKind::Manual => Box::new(ManualRunner::new(context)),
        }
    }
}

impl FromStr for RunnerKind {
    type Err = CourseworkError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "cmd" => Ok(RunnerKind::Cmd),
            "py" => Ok(RunnerKind::Unit),
            "manual" => Ok(RunnerKind::Manual),
            _ => Err(CourseworkError::RunnerNotFound(name.to_string())),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Look a runner up by its short name.
pub fn get_runner_by_name(name: &str) -> Result<RunnerKind> {
    name.parse()
}

/// Running totals for the summary line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub earned_points: u32,
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, result: &TestCaseResult) {
        if result.was_successful {
            self.earned_points += result.points;
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

fn announce(output: &mut dyn OutputSink, name: &str) {
    output.rule(None);
    output.write_line(Style::Heading, &format!("Running {}...", name));
}

/// Print a graded case. `verdict` overrides the default "Failed!" label.
fn report_case(output: &mut dyn OutputSink, result: &TestCaseResult, verdict: Option<&str>) {
    if result.was_successful {
        output.write_line(Style::Success, "Passed!");
    } else {
        output.write_line(Style::Failure, verdict.unwrap_or("Failed!"));
        if !result.hint.is_empty() {
            output.write_line(Style::Emphasis, &format!("Hint: {}", result.hint));
        }
    }
}

/// Print the summary block that closes every graded run.
pub fn display_results(output: &mut dyn OutputSink, assignment: &Assignment, tally: &Tally) {
    output.rule(Some("Summary"));
    output.write_line(
        Style::Heading,
        &format!(
            "Points: {}/{}    Passed: {}    Failed: {}",
            tally.earned_points, assignment.total_points, tally.passed, tally.failed
        ),
    );
    output.plain("");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_runner_by_name() {
        assert_eq!(get_runner_by_name("cmd").unwrap(), RunnerKind::Cmd);
        assert_eq!(get_runner_by_name("py").unwrap(), RunnerKind::Unit);
        assert_eq!(get_runner_by_name("manual").unwrap(), RunnerKind::Manual);
        assert_ne!(get_runner_by_name("cmd").unwrap(), get_runner_by_name("py").unwrap());
    }

    #[test]
    fn test_get_runner_by_name_fail() {
        assert!(matches!(
            get_runner_by_name("nonexistent"),
            Err(CourseworkError::RunnerNotFound(name)) if name == "nonexistent"
        ));
        // Lookup is exact.
        assert!(get_runner_by_name("CMD").is_err());
        assert!(get_runner_by_name(" py").is_err());
    }

    #[test]
    fn test_keys_round_trip() {
        for kind in [RunnerKind::Cmd, RunnerKind::Unit, RunnerKind::Manual] {
            assert_eq!(get_runner_by_name(kind.key()).unwrap(), kind);
        }
    }

    #[test]
    fn test_tally() {
        let mut tally = Tally::default();
        tally.record(&TestCaseResult::new("a", true, 10, ""));
        tally.record(&TestCaseResult::new("b", false, 5, ""));
        tally.record(&TestCaseResult::new("c", true, 3, ""));

        assert_eq!(tally, Tally { earned_points: 13, passed: 2, failed: 1 });
    }
}
