// src/report.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::RunnerResult;

/// Render a plain-text grading report: a title block, one line per test
/// case, then the contents of each submitted file.
pub fn render(result: &RunnerResult, files: &[PathBuf]) -> String {
    let earned = result.earned_points();
    let total = result.assignment.total_points;

    let score = if total == 0 {
        format!("{}/{}", earned, total)
    } else {
        format!("{}/{} ({:.0}%)", earned, total, f64::from(earned) * 100.0 / f64::from(total))
    };

    let mut out = format!(
        "Coursework Report\n\
         =================\n\
         \n\
         Course:      {}\n\
         Assignment:  {}\n\
         Student:     {}\n\
         Graded at:   {}\n\
         Total Score: {}\n\
         \n",
        result.course.name,
        result.assignment.name,
        result.user.name,
        result.ran_at.format("%Y-%m-%d %H:%M UTC"),
        score,
    );

    for case in &result.test_case_results {
        let mark = if case.was_successful { "PASS" } else { "FAIL" };
        out.push_str(&format!("  [{}] {} ({})\n", mark, case.name, case.points));
    }

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        out.push_str(&format!("\n---- {} ----\n", name));
        out.push_str(&file_contents(file));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

fn file_contents(file: &Path) -> String {
    match fs::read(file) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => format!("<binary file, {} bytes>", e.as_bytes().len()),
        },
        Err(e) => format!("<unreadable: {}>", e),
    }
}
