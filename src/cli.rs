// src/cli.rs
//! The `coursework` command line.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand};

use crate::config::{CONFIG_ENV_VAR, Configuration, DUE_DATE_FORMAT};
use crate::console::{Console, OutputSink, Style};
use crate::errors::{CourseworkError, Result};
use crate::grading::SuiteRegistry;
use crate::privilege::with_real_identity;
use crate::state::AppContext;
use crate::submission;
use crate::user::User;

/// Hand in coursework and collect grading reports.
///
/// EXAMPLES:
///     coursework list                        Show your assignments
///     coursework submit cs141 hw1 sort.c     Grade and hand in sort.c
///     coursework report cs141 hw1            Collect reports (instructors)
#[derive(Parser, Debug)]
#[command(name = "coursework")]
#[command(version)]
pub struct Cli {
    /// Path to the coursework configuration file
    #[arg(long, short = 'c', env = CONFIG_ENV_VAR, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the assignments for every course you are enrolled in
    List,

    /// Show the details of one assignment
    Detail { course: String, assignment: String },

    /// Grade files and hand them in
    Submit {
        course: String,
        assignment: String,
        /// Files to hand in
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Replace an earlier submission without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Write a report for every student into your collection directory
    Report { course: String, assignment: String },

    /// Open the configuration file in $EDITOR
    Edit,
}

/// Parse the process arguments and run the selected command.
///
/// Hosts that ship grading suites build a registry and call this from their
/// own `main`.
pub fn run_with(suites: SuiteRegistry) -> ExitCode {
    let cli = Cli::parse();
    let mut console = Console::stdout();

    match dispatch(cli, &suites, &mut console) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("command failed: {:?}", e);
            console.write_line(Style::Failure, &format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}

pub fn dispatch(cli: Cli, suites: &SuiteRegistry, output: &mut dyn OutputSink) -> Result<()> {
    let config_path = cli.config.ok_or_else(|| {
        CourseworkError::ImproperlyConfigured(format!(
            "{} is not defined. Cannot parse config.",
            CONFIG_ENV_VAR
        ))
    })?;

    let config = Configuration::load(&config_path)?;
    let user = User::from_env(&config, None);
    let ctx = AppContext::new(config, user);
    log::debug!("running as {} ({:?})", ctx.user.name, ctx.user.role);

    match cli.command {
        Commands::List => list(&ctx, output),
        Commands::Detail { course, assignment } => detail(&ctx, &course, &assignment, output),
        Commands::Submit { course, assignment, files, yes } => {
            let (course, assignment) = submission::resolve(&ctx, &course, &assignment)?;

            let mut overwrite = yes;
            if !overwrite && submission::existing_submission(&ctx, course, assignment)?.is_some() {
                overwrite = confirm(&format!(
                    "You already submitted {}. Replace it? [y/n] ",
                    assignment.name
                ))?;
                if !overwrite {
                    output.plain("Submission cancelled.");
                    return Ok(());
                }
            }

            submission::submit(&ctx, suites, course, assignment, &files, overwrite, output)?;
            Ok(())
        }
        Commands::Report { course, assignment } => {
            let (course, assignment) = submission::resolve(&ctx, &course, &assignment)?;
            let written = submission::collect_reports(&ctx, course, assignment, output)?;
            if let Some(dir) = written.first().and_then(|p| p.parent()) {
                output.plain(&format!("Wrote {} reports to {}", written.len(), dir.display()));
            }
            Ok(())
        }
        Commands::Edit => {
            if !ctx.user.is_instructor() {
                return Err(CourseworkError::NotAnInstructor);
            }
            edit(&config_path, output)
        }
    }
}

fn list(ctx: &AppContext, output: &mut dyn OutputSink) -> Result<()> {
    let assignments = submission::list_assignments(ctx);
    if assignments.is_empty() {
        output.plain("You have no assignments.");
        return Ok(());
    }

    output.rule(Some("Assignments"));
    for (assignment, course) in assignments {
        output.write_line(
            Style::Plain,
            &format!(
                "{:<12} {:<12} due {}",
                course.name,
                assignment.name,
                assignment.due_date.format(DUE_DATE_FORMAT)
            ),
        );
    }
    Ok(())
}

fn detail(ctx: &AppContext, course: &str, assignment: &str, output: &mut dyn OutputSink) -> Result<()> {
    let (course, assignment) = submission::resolve(ctx, course, assignment)?;

    output.rule(Some(&assignment.name));
    output.plain(&format!("Course:       {}", course.name));
    output.plain(&format!("Due:          {}", assignment.due_date.format(DUE_DATE_FORMAT)));
    output.plain(&format!("Total points: {}", assignment.total_points));
    output.plain(&format!("Grading:      {}", assignment.test.runner));
    if !assignment.description.is_empty() {
        output.plain("");
        output.plain(&assignment.description);
    }
    Ok(())
}

fn edit(path: &Path, output: &mut dyn OutputSink) -> Result<()> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    loop {
        let status = with_real_identity(|| Ok(Command::new(&editor).arg(path).status()?))?;
        if !status.success() {
            log::warn!("{} exited with {}", editor, status);
        }

        match Configuration::validate(path) {
            Ok(()) => {
                output.write_line(Style::Success, "Configuration is valid.");
                return Ok(());
            }
            Err(e) => {
                output.write_line(Style::Failure, &format!("Invalid configuration: {}", e));
                if !confirm("Edit again? [y/n] ")? {
                    return Err(e);
                }
            }
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "coursework", "--config", "/etc/coursework.toml", "submit", "cs141", "hw1", "a.c", "b.c", "--yes",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/coursework.toml")));
        match cli.command {
            Commands::Submit { course, assignment, files, yes } => {
                assert_eq!(course, "cs141");
                assert_eq!(assignment, "hw1");
                assert_eq!(files, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
                assert!(yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_submit_requires_files() {
        assert!(Cli::try_parse_from(["coursework", "submit", "cs141", "hw1"]).is_err());
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("n"));
        assert!(!parse_answer(""));
    }
}
