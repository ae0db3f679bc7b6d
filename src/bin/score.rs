// src/bin/score.rs
//! Records one test case from inside a grading script.
//!
//! ```sh
//! coursework-score "compiles" 10 true -m "check your includes"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use coursework::models::TestCaseResult;
use coursework::sidecar::{RUNNER_OUTPUT_ENV, append_score};

/// Append a scored test case to the grading run's side channel
#[derive(Parser, Debug)]
#[command(name = "coursework-score")]
#[command(version)]
struct Args {
    /// Name of the test case
    name: String,
    /// Points the test case is worth
    points: u32,
    /// Whether the test case passed (true/false, yes/no, 1/0)
    #[arg(value_parser = parse_flag, action = clap::ArgAction::Set)]
    was_successful: bool,
    /// Hint shown to the student when the case fails
    #[arg(long, short = 'm', default_value = "")]
    message: String,
    /// Side-channel file, normally provided by the runner
    #[arg(long, env = RUNNER_OUTPUT_ENV)]
    output: PathBuf,
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "f" | "false" | "0" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let args = Args::parse();

    let result = TestCaseResult::new(args.name, args.was_successful, args.points, args.message);
    match append_score(&args.output, &result) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
