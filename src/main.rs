// src/main.rs
use std::process::ExitCode;

use coursework::grading::SuiteRegistry;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    coursework::cli::run_with(SuiteRegistry::new())
}
