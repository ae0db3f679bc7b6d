// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{Assignment, Course};
use crate::errors::Result;
use crate::user::User;

/// Name of the file a run is persisted to inside the submission directory.
pub const RUNNER_OUTPUT: &str = ".runner-output";

/// Outcome of a single test case.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCaseResult {
    pub name: String,
    pub was_successful: bool,
    pub points: u32,
    #[serde(default)]
    pub hint: String,
}

impl TestCaseResult {
    pub fn new(name: impl Into<String>, was_successful: bool, points: u32, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            was_successful,
            points,
            hint: hint.into(),
        }
    }

    /// Encode as a side-channel record.
    ///
    /// Every `S` in the JSON text is written as the `\u0053` escape, so the
    /// record delimiter can never appear inside an encoded record. All `S`
    /// bytes sit inside string literals (field names are lowercase), where
    /// the escape is valid JSON.
    pub fn to_record(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_string(self)?;
        Ok(json.replace('S', "\\u0053").into_bytes())
    }

    pub fn from_record(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Everything recorded about one submission run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunnerResult {
    pub user: User,
    pub ran_at: DateTime<Utc>,
    pub course: Course,
    pub assignment: Assignment,
    pub test_case_results: Vec<TestCaseResult>,
}

impl RunnerResult {
    pub fn new(user: &User, course: &Course, assignment: &Assignment, test_case_results: Vec<TestCaseResult>) -> Self {
        Self {
            user: user.clone(),
            ran_at: Utc::now(),
            course: course.clone(),
            assignment: assignment.clone(),
            test_case_results,
        }
    }

    pub fn earned_points(&self) -> u32 {
        self.test_case_results
            .iter()
            .filter(|r| r.was_successful)
            .map(|r| r.points)
            .sum()
    }

    pub fn passed(&self) -> usize {
        self.test_case_results.iter().filter(|r| r.was_successful).count()
    }

    pub fn failed(&self) -> usize {
        self.test_case_results.len() - self.passed()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Write to `<dir>/.runner-output`.
    ///
    /// The bytes go to a scratch file first and are renamed into place, so a
    /// reader never sees a half-written result.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(RUNNER_OUTPUT);
        let scratch = dir.join(format!("{}.{}.tmp", RUNNER_OUTPUT, uuid::Uuid::new_v4()));

        let write = || -> Result<()> {
            let mut file = fs::File::create(&scratch)?;
            file.write_all(&self.to_bytes()?)?;
            file.sync_all()?;
            fs::rename(&scratch, &target)?;
            Ok(())
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&scratch);
            return Err(e);
        }

        log::debug!("saved runner output to {}", target.display());
        Ok(target)
    }

    /// Read `<dir>/.runner-output`.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(dir.join(RUNNER_OUTPUT))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestSpec;
    use crate::user::Role;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn sample() -> RunnerResult {
        let assignment = Assignment {
            name: "hw1".to_string(),
            description: "First homework".to_string(),
            due_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 10)
                .unwrap()
                .and_hms_opt(23, 59, 0)
                .unwrap(),
            total_points: 30,
            test: TestSpec::manual(),
        };
        let course = Course {
            name: "cs141".to_string(),
            instructors: vec!["ian".to_string()],
            students: vec!["alice".to_string()],
            assignments: BTreeMap::from([("hw1".to_string(), assignment.clone())]),
        };
        let user = User::new("alice", Role::Student);

        RunnerResult::new(
            &user,
            &course,
            &assignment,
            vec![
                TestCaseResult::new("compiles", true, 10, ""),
                TestCaseResult::new("Sorts input", false, 15, "Check the SPLIT edge case"),
                TestCaseResult::new("style", true, 5, "Keep lines short"),
            ],
        )
    }

    #[test]
    fn test_record_round_trip() {
        let cases = [
            TestCaseResult::new("My test case", true, 15, ""),
            TestCaseResult::new("", false, 0, "hint with \"quotes\" and \\ slashes"),
            TestCaseResult::new("SPLIT", true, 3, "SPLITSPLIT"),
            TestCaseResult::new("unicode ✓", false, u32::MAX, "Ünïcödé"),
        ];

        for case in cases {
            let record = case.to_record().unwrap();
            assert!(!record.windows(5).any(|w| w == b"SPLIT"), "delimiter leaked into {:?}", case);
            assert_eq!(TestCaseResult::from_record(&record).unwrap(), case);
        }
    }

    #[test]
    fn test_runner_result_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample();

        let path = result.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(RUNNER_OUTPUT));

        let loaded = RunnerResult::load(dir.path()).unwrap();
        assert_eq!(loaded, result);
        assert_eq!(
            loaded.test_case_results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["compiles", "Sorts input", "style"]
        );

        // Only the output file is left behind.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_aggregates() {
        let result = sample();
        assert_eq!(result.earned_points(), 15);
        assert_eq!(result.passed(), 2);
        assert_eq!(result.failed(), 1);
    }
}
