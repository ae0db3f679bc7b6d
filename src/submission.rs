// src/submission.rs
//! Submission and collection workflows built on top of the runners.

use std::fs;
use std::os::unix::fs::chown;
use std::path::{Path, PathBuf};

use crate::config::{Assignment, Course};
use crate::console::{OutputSink, Style, track};
use crate::errors::{CourseworkError, Result};
use crate::grading::SuiteRegistry;
use crate::models::{RUNNER_OUTPUT, RunnerResult};
use crate::privilege::with_real_identity;
use crate::report;
use crate::runners::{RunContext, get_runner_by_name};
use crate::state::AppContext;

/// Assignments visible to the current user, sorted by course name.
pub fn list_assignments(ctx: &AppContext) -> Vec<(&Assignment, &Course)> {
    let mut assignments: Vec<_> = ctx
        .config
        .courses
        .values()
        .filter(|course| course.has_student(&ctx.user.name))
        .flat_map(|course| course.assignments.values().map(move |a| (a, course)))
        .collect();
    assignments.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    assignments
}

/// Look up a course and one of its assignments on behalf of the current user.
///
/// Students may only see courses they are enrolled in.
pub fn resolve<'c>(ctx: &'c AppContext, course: &str, assignment: &str) -> Result<(&'c Course, &'c Assignment)> {
    let course = ctx.config.course(course)?;

    if !ctx.user.is_instructor() && !course.has_student(&ctx.user.name) {
        return Err(CourseworkError::NotAMember(course.name.clone()));
    }

    let assignment = course.assignment(assignment)?;
    Ok((course, assignment))
}

/// Where the current user's submission for `assignment` is stored, if one exists.
pub fn existing_submission(ctx: &AppContext, course: &Course, assignment: &Assignment) -> Result<Option<PathBuf>> {
    let save_path = ctx.config.submission_path(&ctx.user.name, course, assignment);
    with_real_identity(|| Ok(save_path.exists().then_some(save_path)))
}

/// Grade `files` and store them together with the result.
///
/// An earlier submission is only replaced when `overwrite` is set; it is
/// removed before grading starts, so a run that fails part-way leaves no
/// stale result behind.
pub fn submit(
    ctx: &AppContext,
    suites: &SuiteRegistry,
    course: &Course,
    assignment: &Assignment,
    files: &[PathBuf],
    overwrite: bool,
    output: &mut dyn OutputSink,
) -> Result<PathBuf> {
    let user = &ctx.user;
    let kind = get_runner_by_name(&assignment.test.runner)?;

    let files: Vec<PathBuf> = with_real_identity(|| {
        Ok(files
            .iter()
            .filter_map(|f| std::path::absolute(f).ok())
            .filter(|f| {
                let keep = f.is_file();
                if !keep {
                    log::warn!("ignoring {}: not a regular file", f.display());
                }
                keep
            })
            .collect())
    })?;

    let save_path = std::path::absolute(ctx.config.submission_path(&user.name, course, assignment))?;

    with_real_identity(|| {
        if save_path.exists() {
            if !overwrite {
                return Err(CourseworkError::SubmissionExists(save_path.clone()));
            }
            log::info!("removing previous submission at {}", save_path.display());
            fs::remove_dir_all(&save_path)?;
        }
        Ok(())
    })?;

    log::debug!("grading {} for {} with the {} runner", assignment.name, user.name, kind);
    let context = RunContext::new(user, course, assignment, files.clone());
    let result = kind.build(context, suites).run(output)?;

    with_real_identity(|| {
        fs::create_dir_all(&save_path)?;
        result.save(&save_path)?;

        track(output, "Saving submitted files...", &files, |_, file| -> Result<()> {
            if let Some(name) = file.file_name() {
                fs::copy(file, save_path.join(name))?;
            }
            Ok(())
        })
    })?;

    output.write_line(Style::Success, &format!("{} was successfully submitted!", assignment.name));
    Ok(save_path)
}

/// Render a report for every student in `course` and write them to the
/// instructor's collection directory as `<student>.txt`.
pub fn collect_reports(
    ctx: &AppContext,
    course: &Course,
    assignment: &Assignment,
    output: &mut dyn OutputSink,
) -> Result<Vec<PathBuf>> {
    if !ctx.user.is_instructor() {
        return Err(CourseworkError::NotAnInstructor);
    }

    let mut reports: Vec<(String, String)> = Vec::new();
    track(output, "Generating for students...", &course.students, |output, student| -> Result<()> {
        match load_submission(ctx, student, course, assignment) {
            Ok((result, files)) => reports.push((student.clone(), report::render(&result, &files))),
            Err(e @ CourseworkError::NotSubmitted { .. }) => output.write_line(Style::Failure, &e.to_string()),
            Err(e) => return Err(e),
        }
        Ok(())
    })?;

    let save_path = ctx.config.collection_path(&ctx.user.name, course, assignment);
    let gid = ctx.config.admin_gid;

    let written = with_real_identity(|| {
        fs::create_dir_all(&save_path)?;
        hand_to_admin_group(&save_path, gid);

        let mut written = Vec::with_capacity(reports.len());
        for (student, contents) in &reports {
            let path = save_path.join(format!("{}.txt", student));
            fs::write(&path, contents)?;
            hand_to_admin_group(&path, gid);
            written.push(path);
        }
        Ok(written)
    })?;

    output.write_line(Style::Success, "Reports generated!");
    Ok(written)
}

/// Load a student's stored result and the files they handed in.
pub fn load_submission(
    ctx: &AppContext,
    student: &str,
    course: &Course,
    assignment: &Assignment,
) -> Result<(RunnerResult, Vec<PathBuf>)> {
    let submission_path = ctx.config.submission_path(student, course, assignment);

    with_real_identity(|| {
        if !submission_path.exists() {
            return Err(CourseworkError::NotSubmitted {
                student: student.to_string(),
                assignment: assignment.name.clone(),
            });
        }

        let result = RunnerResult::load(&submission_path)?;
        let mut files: Vec<PathBuf> = fs::read_dir(&submission_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.file_name().is_some_and(|n| n != RUNNER_OUTPUT))
            .collect();
        files.sort();

        Ok((result, files))
    })
}

fn hand_to_admin_group(path: &Path, gid: u32) {
    if let Err(e) = chown(path, None, Some(gid)) {
        log::warn!("could not hand {} to gid {}: {}", path.display(), gid, e);
    }
}
