// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourseworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    #[error("Runner '{0}' not found")]
    RunnerNotFound(String),

    #[error("No grading suites registered for '{0}'")]
    SuiteNotRegistered(String),

    #[error("Could not switch effective identity: {0}")]
    Privilege(#[source] std::io::Error),

    #[error("A submission already exists at {}", .0.display())]
    SubmissionExists(PathBuf),

    #[error("{student} has not submitted {assignment}")]
    NotSubmitted { student: String, assignment: String },

    #[error("{0} is not a valid course")]
    UnknownCourse(String),

    #[error("{assignment} is not a part of {course}")]
    UnknownAssignment { course: String, assignment: String },

    #[error("You are not a member of {0}")]
    NotAMember(String),

    #[error("You are not an admin!")]
    NotAnInstructor,
}

pub type Result<T> = std::result::Result<T, CourseworkError>;
