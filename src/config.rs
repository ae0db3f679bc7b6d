// src/config.rs
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::{CourseworkError, Result};

/// Format used for `due_date` in the config file.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Environment variable holding the path to the config file.
pub const CONFIG_ENV_VAR: &str = "COURSEWORK_CONFIG";

const DEFAULT_ADMIN_GROUP: &str = "sysman";
const DEFAULT_SUBMISSION: &str = "/home/stu/{student}/.local/share/coursework/{course}/{assignment}";
const DEFAULT_COLLECTION: &str = "/home/fs/{instructor}/coursework/{course}/{assignment}";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*(\w+)\s*\}").expect("placeholder pattern is valid"));

/// The loaded coursework configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub admins: Vec<String>,
    pub admin_group: String,
    pub admin_gid: u32,
    /// Path template for student submissions.
    pub submission: String,
    /// Path template for collected instructor reports.
    pub collection: String,
    pub courses: BTreeMap<String, Course>,
}

/// A set of assignments together with the people allowed to see them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub name: String,
    #[serde(default)]
    pub instructors: Vec<String>,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub assignments: BTreeMap<String, Assignment>,
}

/// What a student sees, plus how their submission gets graded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub description: String,
    pub due_date: NaiveDateTime,
    pub total_points: u32,
    pub test: TestSpec,
}

/// Runner selection key and the script (or suite key) it runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    pub runner: String,
    pub filename: String,
    /// Upper bound on a grading script's wall-clock time. Only the `cmd` runner honours it.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    coursework: RawSettings,
    #[serde(default)]
    assignments: BTreeMap<String, RawAssignment>,
    #[serde(default)]
    courses: BTreeMap<String, RawCourse>,
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default = "default_admin_group")]
    admin_group: String,
    #[serde(default = "default_submission")]
    submission: String,
    #[serde(default = "default_collection")]
    collection: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            admin_group: default_admin_group(),
            submission: default_submission(),
            collection: default_collection(),
        }
    }
}

fn default_admin_group() -> String {
    DEFAULT_ADMIN_GROUP.to_string()
}

fn default_submission() -> String {
    DEFAULT_SUBMISSION.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Deserialize)]
struct RawAssignment {
    #[serde(default)]
    description: String,
    due_date: String,
    #[serde(default)]
    total_points: u32,
    #[serde(default)]
    test: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
struct RawCourse {
    #[serde(default)]
    instructors: Vec<String>,
    #[serde(default)]
    students: Vec<String>,
    #[serde(default)]
    assignments: Vec<String>,
}

impl Configuration {
    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CourseworkError::ImproperlyConfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load the configuration from the file named by `COURSEWORK_CONFIG`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).map_err(|_| {
            CourseworkError::ImproperlyConfigured(format!(
                "{} is not defined. Cannot parse config.",
                CONFIG_ENV_VAR
            ))
        })?;
        Self::load(Path::new(&path))
    }

    /// Check that the file at `path` loads without error.
    pub fn validate(path: &Path) -> Result<()> {
        Self::load(path).map(|_| ())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let parsed: RawConfig = toml::from_str(contents)
            .map_err(|e| CourseworkError::ImproperlyConfigured(e.to_string()))?;

        let assignments = load_assignments(parsed.assignments)?;
        let courses = load_courses(parsed.courses, &assignments)?;

        if courses.is_empty() {
            log::warn!("No courses defined. Consider defining courses.");
        }

        let settings = parsed.coursework;
        let admin_gid = crate::privilege::group_id(&settings.admin_group).ok_or_else(|| {
            CourseworkError::ImproperlyConfigured(format!(
                "admin group {} does not exist",
                settings.admin_group
            ))
        })?;

        Ok(Configuration {
            admins: settings.admins,
            admin_group: settings.admin_group,
            admin_gid,
            submission: settings.submission,
            collection: settings.collection,
            courses,
        })
    }

    pub fn course(&self, name: &str) -> Result<&Course> {
        self.courses
            .get(name)
            .ok_or_else(|| CourseworkError::UnknownCourse(name.to_string()))
    }

    /// Where `student`'s submission for `assignment` lives.
    pub fn submission_path(&self, student: &str, course: &Course, assignment: &Assignment) -> PathBuf {
        let values = [
            ("student", student),
            ("course", course.name.as_str()),
            ("assignment", assignment.name.as_str()),
        ];
        PathBuf::from(render_template(&self.submission, &values))
    }

    /// Where `instructor`'s collected reports for `assignment` are written.
    pub fn collection_path(&self, instructor: &str, course: &Course, assignment: &Assignment) -> PathBuf {
        let values = [
            ("instructor", instructor),
            ("course", course.name.as_str()),
            ("assignment", assignment.name.as_str()),
        ];
        PathBuf::from(render_template(&self.collection, &values))
    }
}

impl Course {
    pub fn assignment(&self, name: &str) -> Result<&Assignment> {
        self.assignments
            .get(name)
            .ok_or_else(|| CourseworkError::UnknownAssignment {
                course: self.name.clone(),
                assignment: name.to_string(),
            })
    }

    pub fn has_student(&self, name: &str) -> bool {
        self.students.iter().any(|s| s == name)
    }
}

impl TestSpec {
    /// Parse the `"<runner>:<filename>"` form used in the config file.
    pub fn parse(spec: &str) -> Result<Self> {
        let (runner, filename) = spec.split_once(':').ok_or_else(|| {
            CourseworkError::ImproperlyConfigured(format!(
                "test '{}' must have the form <runner>:<filename>",
                spec
            ))
        })?;

        Ok(TestSpec {
            runner: runner.trim().to_string(),
            filename: filename.trim().to_string(),
            timeout_secs: None,
        })
    }

    pub fn manual() -> Self {
        TestSpec {
            runner: "manual".to_string(),
            filename: String::new(),
            timeout_secs: None,
        }
    }
}

fn load_assignments(raw: BTreeMap<String, RawAssignment>) -> Result<BTreeMap<String, Assignment>> {
    raw.into_iter()
        .map(|(name, values)| {
            let due_date = NaiveDateTime::parse_from_str(&values.due_date, DUE_DATE_FORMAT)
                .map_err(|e| {
                    CourseworkError::ImproperlyConfigured(format!(
                        "Error parsing due date of {}: {}",
                        name, e
                    ))
                })?;

            let mut test = match values.test.as_deref() {
                Some(spec) => TestSpec::parse(spec)?,
                None => TestSpec::manual(),
            };
            test.timeout_secs = values.timeout_secs;

            let assignment = Assignment {
                name: name.clone(),
                description: values.description,
                due_date,
                total_points: values.total_points,
                test,
            };
            Ok((name, assignment))
        })
        .collect()
}

fn load_courses(
    raw: BTreeMap<String, RawCourse>,
    assignments: &BTreeMap<String, Assignment>,
) -> Result<BTreeMap<String, Course>> {
    raw.into_iter()
        .map(|(name, values)| {
            let course_assignments = values
                .assignments
                .iter()
                .map(|assignment| {
                    assignments
                        .get(assignment)
                        .map(|a| (assignment.clone(), a.clone()))
                        .ok_or_else(|| {
                            CourseworkError::ImproperlyConfigured(format!(
                                "Assignment {} does not exist",
                                assignment
                            ))
                        })
                })
                .collect::<Result<BTreeMap<_, _>>>()?;

            let course = Course {
                name: name.clone(),
                instructors: values.instructors,
                students: values.students,
                assignments: course_assignments,
            };
            Ok((name, course))
        })
        .collect()
}

/// Substitute `{key}` placeholders. Unknown keys are left as they are.
fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
[coursework]
admins = ["ian"]
admin_group = "root"
submission = "/srv/submissions/{course}/{assignment}/{student}"

[assignments.hw1]
description = "First homework"
due_date = "2025-01-10 23:59"
total_points = 45
test = "py:hw1"

[assignments.essay]
due_date = "2025-02-01 12:00"

[courses.cs141]
instructors = ["ian"]
students = ["alice", "bob"]
assignments = ["hw1", "essay"]
"#;

    #[test]
    fn test_load_configuration() {
        let config = Configuration::from_toml_str(CONFIG).unwrap();

        assert_eq!(config.admins, vec!["ian".to_string()]);
        assert_eq!(config.admin_gid, 0);
        assert_eq!(config.collection, DEFAULT_COLLECTION);

        let course = config.course("cs141").unwrap();
        assert!(course.has_student("alice"));
        assert!(!course.has_student("ian"));

        let hw1 = course.assignment("hw1").unwrap();
        assert_eq!(hw1.total_points, 45);
        assert_eq!(hw1.test.runner, "py");
        assert_eq!(hw1.test.filename, "hw1");
        assert_eq!(hw1.due_date.format(DUE_DATE_FORMAT).to_string(), "2025-01-10 23:59");

        let essay = course.assignment("essay").unwrap();
        assert_eq!(essay.test, TestSpec::manual());
        assert_eq!(essay.total_points, 0);
        assert_eq!(essay.description, "");
    }

    #[test]
    fn test_bad_due_date_is_improperly_configured() {
        let config = r#"
[coursework]
admin_group = "root"

[assignments.hw1]
due_date = "tomorrow"
"#;
        let err = Configuration::from_toml_str(config).unwrap_err();
        assert!(matches!(err, CourseworkError::ImproperlyConfigured(_)));
    }

    #[test]
    fn test_missing_assignment_reference() {
        let config = r#"
[coursework]
admin_group = "root"

[courses.cs141]
assignments = ["missing"]
"#;
        let err = Configuration::from_toml_str(config).unwrap_err();
        assert!(matches!(err, CourseworkError::ImproperlyConfigured(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_missing_admin_group() {
        let config = r#"
[coursework]
admin_group = "definitely-not-a-group-name"
"#;
        let err = Configuration::from_toml_str(config).unwrap_err();
        assert!(matches!(err, CourseworkError::ImproperlyConfigured(msg) if msg.contains("admin group")));
    }

    #[test]
    fn test_submission_path_rendering() {
        let config = Configuration::from_toml_str(CONFIG).unwrap();
        let course = config.course("cs141").unwrap();
        let hw1 = course.assignment("hw1").unwrap();

        assert_eq!(
            config.submission_path("alice", course, hw1),
            PathBuf::from("/srv/submissions/cs141/hw1/alice")
        );
        assert_eq!(
            config.collection_path("ian", course, hw1),
            PathBuf::from("/home/fs/ian/coursework/cs141/hw1")
        );
    }

    #[test]
    fn test_render_template_keeps_unknown_placeholders() {
        let rendered = render_template("{a}/{b}", &[("a", "x")]);
        assert_eq!(rendered, "x/{b}");
    }

    #[test]
    fn test_test_spec_parse() {
        let spec = TestSpec::parse("cmd:/opt/grading/hw1.sh").unwrap();
        assert_eq!(spec.runner, "cmd");
        assert_eq!(spec.filename, "/opt/grading/hw1.sh");
        assert!(TestSpec::parse("no-colon").is_err());
    }
}
