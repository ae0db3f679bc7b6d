// src/grading.rs
//! In-process grading suites.
//!
//! A course host declares its scored tests with [`GradingSuite::define`]:
//!
//! ```
//! use coursework::grading::GradingSuite;
//!
//! let suite = GradingSuite::define("Homework1", |s| {
//!     s.test("test_adds", |t| t.assert_eq(1 + 1, 2))
//!         .points(10)
//!         .name("Addition works")
//!         .hint("Did you carry the one?");
//!     // No points, so it is not collected.
//!     s.test("test_helper", |t| t.assert_true(true, "always"));
//! });
//!
//! assert_eq!(suite.assessments().len(), 1);
//! assert_eq!(suite.assessments()[0].name, "Addition works");
//! ```
//!
//! Suites are then registered in a [`SuiteRegistry`] under the key an
//! assignment's `test = "py:<key>"` entry names.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::errors::{CourseworkError, Result};

/// Only units whose identifier carries this prefix are collected.
pub const TEST_PREFIX: &str = "test_";

pub type UnitResult<T = ()> = std::result::Result<T, UnitError>;
pub type UnitBody = Arc<dyn Fn(&mut TestContext) -> UnitResult + Send + Sync>;

/// Why a unit stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// An assertion did not hold.
    Failure(String),
    /// Something other than an assertion went wrong.
    Error(String),
    /// The unit opted out; it is neither passed nor failed.
    Skipped(String),
}

impl UnitError {
    pub fn error(message: impl Into<String>) -> Self {
        UnitError::Error(message.into())
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitError::Failure(m) => write!(f, "AssertionError: {}", m),
            UnitError::Error(m) => write!(f, "Error: {}", m),
            UnitError::Skipped(m) => write!(f, "Skipped: {}", m),
        }
    }
}

// Lets grading code use `?` on I/O, parsing, etc. UnitError itself is not an
// Error, which keeps this from overlapping the reflexive From impl.
impl<E: std::error::Error> From<E> for UnitError {
    fn from(e: E) -> Self {
        UnitError::Error(e.to_string())
    }
}

/// Handed to each unit. Counts the assertions made through it, which only
/// feeds the debug log: a unit using the standard `assert!` macros passes
/// without ever touching the counter.
#[derive(Debug, Default)]
pub struct TestContext {
    assertions: usize,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assertions(&self) -> usize {
        self.assertions
    }

    fn check(&mut self, holds: bool, message: impl FnOnce() -> String) -> UnitResult {
        self.assertions += 1;
        if holds {
            Ok(())
        } else {
            Err(UnitError::Failure(message()))
        }
    }

    pub fn assert_true(&mut self, condition: bool, message: &str) -> UnitResult {
        self.check(condition, || message.to_string())
    }

    pub fn assert_false(&mut self, condition: bool, message: &str) -> UnitResult {
        self.check(!condition, || message.to_string())
    }

    pub fn assert_eq<T: PartialEq + fmt::Debug>(&mut self, left: T, right: T) -> UnitResult {
        let holds = left == right;
        self.check(holds, || format!("{:?} != {:?}", left, right))
    }

    pub fn assert_ne<T: PartialEq + fmt::Debug>(&mut self, left: T, right: T) -> UnitResult {
        let holds = left != right;
        self.check(holds, || format!("{:?} == {:?}", left, right))
    }

    pub fn assert_contains(&mut self, haystack: &str, needle: &str) -> UnitResult {
        self.check(haystack.contains(needle), || {
            format!("{:?} not found in {:?}", needle, haystack)
        })
    }

    /// Fail unconditionally.
    pub fn fail(&mut self, message: &str) -> UnitResult {
        self.check(false, || message.to_string())
    }

    pub fn skip(&mut self, reason: &str) -> UnitResult {
        Err(UnitError::Skipped(reason.to_string()))
    }

    /// Read one of the submitted files from the test environment.
    pub fn read_submitted(&self, name: &str) -> UnitResult<String> {
        std::fs::read_to_string(name)
            .map_err(|e| UnitError::Error(format!("cannot read submitted file {}: {}", name, e)))
    }
}

/// One scored unit, ready to run.
#[derive(Clone)]
pub struct Assessment {
    pub identifier: String,
    pub name: String,
    pub points: u32,
    pub hint: String,
    pub body: UnitBody,
}

impl fmt::Debug for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assessment")
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("points", &self.points)
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}

/// A declared unit, before collection.
pub struct UnitDecl {
    identifier: String,
    body: UnitBody,
    points: Option<u32>,
    name: Option<String>,
    hint: Option<String>,
}

impl UnitDecl {
    /// Points awarded on success. Units without points are not collected.
    pub fn points(&mut self, value: u32) -> &mut Self {
        self.points = Some(value);
        self
    }

    /// Display name; defaults to the identifier.
    pub fn name(&mut self, value: impl Into<String>) -> &mut Self {
        self.name = Some(value.into());
        self
    }

    /// Shown to the student when the unit does not pass.
    pub fn hint(&mut self, value: impl Into<String>) -> &mut Self {
        self.hint = Some(value.into());
        self
    }
}

#[derive(Default)]
pub struct SuiteBuilder {
    units: Vec<UnitDecl>,
}

impl SuiteBuilder {
    pub fn test<F>(&mut self, identifier: impl Into<String>, body: F) -> &mut UnitDecl
    where
        F: Fn(&mut TestContext) -> UnitResult + Send + Sync + 'static,
    {
        let index = self.units.len();
        self.units.push(UnitDecl {
            identifier: identifier.into(),
            body: Arc::new(body),
            points: None,
            name: None,
            hint: None,
        });
        &mut self.units[index]
    }
}

/// A named, immutable list of assessments in declaration order.
#[derive(Debug, Clone)]
pub struct GradingSuite {
    name: String,
    assessments: Vec<Assessment>,
}

impl GradingSuite {
    pub fn define(name: impl Into<String>, declare: impl FnOnce(&mut SuiteBuilder)) -> Self {
        let mut builder = SuiteBuilder::default();
        declare(&mut builder);

        let assessments = builder
            .units
            .into_iter()
            .filter(|unit| unit.identifier.starts_with(TEST_PREFIX))
            .filter_map(|unit| {
                let points = unit.points?;
                Some(Assessment {
                    name: unit.name.unwrap_or_else(|| unit.identifier.clone()),
                    identifier: unit.identifier,
                    points,
                    hint: unit.hint.unwrap_or_default(),
                    body: unit.body,
                })
            })
            .collect();

        Self { name: name.into(), assessments }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assessments(&self) -> &[Assessment] {
        &self.assessments
    }
}

/// Grading suites, keyed by the script name assignments refer to.
#[derive(Debug, Clone, Default)]
pub struct SuiteRegistry {
    suites: BTreeMap<String, Vec<GradingSuite>>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, suite: GradingSuite) -> &mut Self {
        self.suites.entry(key.into()).or_default().push(suite);
        self
    }

    pub fn suites_for(&self, key: &str) -> Result<&[GradingSuite]> {
        self.suites
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| CourseworkError::SuiteNotRegistered(key.to_string()))
    }
}

/// How a single assessment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
    Error(String),
    /// The unit skipped itself.
    Inconclusive(String),
}

/// Run one assessment, turning panics into outcomes.
///
/// A unit that returns `Ok(())` without panicking passes. Panics raised by
/// `assert!` and friends count as failures; any other panic is an error.
pub fn run_assessment(assessment: &Assessment) -> Outcome {
    let mut context = TestContext::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (assessment.body)(&mut context)));
    log::debug!("{} made {} context assertions", assessment.identifier, context.assertions());

    match result {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(UnitError::Failure(message))) => Outcome::Failure(message),
        Ok(Err(UnitError::Error(message))) => Outcome::Error(message),
        Ok(Err(UnitError::Skipped(reason))) => Outcome::Inconclusive(format!("skipped: {}", reason)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            if message.starts_with("assertion") {
                Outcome::Failure(message)
            } else {
                Outcome::Error(format!("panicked: {}", message))
            }
        }
    }
}

/// Run `f` with the default panic hook silenced, so a panicking unit does not
/// spray a backtrace over the student's output.
pub fn with_quiet_panics<T>(f: impl FnOnce() -> T) -> T {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);

    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_gather_assessments() {
        let suite = GradingSuite::define("ExampleAssignment", |s| {
            s.test("test_example_test", |t| t.assert_true(true, "always"))
                .name("My test case")
                .hint("This should always pass!")
                .points(15);
        });

        assert_eq!(suite.name(), "ExampleAssignment");
        assert_eq!(suite.assessments().len(), 1);
        let assessment = &suite.assessments()[0];
        assert_eq!(assessment.points, 15);
        assert_eq!(assessment.name, "My test case");
        assert_eq!(assessment.identifier, "test_example_test");
        assert_eq!(assessment.hint, "This should always pass!");
        assert_eq!(run_assessment(assessment), Outcome::Success);
    }

    #[test]
    fn test_collection_rules_and_order() {
        let suite = GradingSuite::define("Ordering", |s| {
            s.test("test_zeta", |t| t.assert_true(true, "")).points(1);
            s.test("helper_with_points", |t| t.assert_true(true, "")).points(5);
            s.test("test_without_points", |t| t.assert_true(true, ""));
            s.test("test_alpha", |t| t.assert_true(true, "")).points(2);
        });

        let names: Vec<_> = suite.assessments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["test_zeta", "test_alpha"]);
        assert!(suite.assessments().iter().all(|a| a.hint.is_empty()));
    }

    #[test]
    fn test_outcome_classification() {
        let suite = GradingSuite::define("Outcomes", |s| {
            s.test("test_fails", |t| t.assert_eq(1, 2)).points(1);
            s.test("test_errors", |_| Err(UnitError::error("boom"))).points(1);
            s.test("test_io_error", |_| {
                std::fs::read("/definitely/not/here")?;
                Ok(())
            })
            .points(1);
            s.test("test_panics", |_| panic!("kaboom")).points(1);
            s.test("test_std_assert", |_| {
                assert_eq!(1, 2);
                Ok(())
            })
            .points(1);
            s.test("test_empty", |_| Ok(())).points(1);
            s.test("test_skips", |t| t.skip("not today")).points(1);
        });

        let outcomes: Vec<_> = with_quiet_panics(|| suite.assessments().iter().map(run_assessment).collect());

        assert_eq!(outcomes[0], Outcome::Failure("1 != 2".to_string()));
        assert_eq!(outcomes[1], Outcome::Error("boom".to_string()));
        assert!(matches!(outcomes[2], Outcome::Error(_)));
        assert_eq!(outcomes[3], Outcome::Error("panicked: kaboom".to_string()));
        assert!(matches!(&outcomes[4], Outcome::Failure(m) if m.starts_with("assertion")));
        assert_eq!(outcomes[5], Outcome::Success);
        assert_eq!(outcomes[6], Outcome::Inconclusive("skipped: not today".to_string()));
    }

    #[test]
    fn test_standard_asserts_pass_and_fail() {
        let suite = GradingSuite::define("StdAsserts", |s| {
            s.test("test_std_pass", |_| {
                assert_eq!(1 + 1, 2);
                Ok(())
            })
            .points(5);
            s.test("test_std_fail", |_| {
                assert_eq!(1 + 1, 3);
                Ok(())
            })
            .points(5);
        });

        let outcomes: Vec<_> = with_quiet_panics(|| suite.assessments().iter().map(run_assessment).collect());

        assert_eq!(outcomes[0], Outcome::Success);
        assert!(matches!(&outcomes[1], Outcome::Failure(m) if m.starts_with("assertion")));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = SuiteRegistry::new();
        registry.register("hw1", GradingSuite::define("A", |_| {}));
        registry.register("hw1", GradingSuite::define("B", |_| {}));

        let suites = registry.suites_for("hw1").unwrap();
        assert_eq!(suites.iter().map(GradingSuite::name).collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(matches!(
            registry.suites_for("hw2"),
            Err(CourseworkError::SuiteNotRegistered(key)) if key == "hw2"
        ));
    }
}
