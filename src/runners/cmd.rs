// src/runners/cmd.rs
//! Script-driven grading.
//!
//! The assignment's script runs in the test environment and reports each
//! case by calling `coursework-score`, which appends to a private side-channel
//! file named in `COURSEWORK_RUNNER_OUTPUT`.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::console::{OutputSink, Style};
use crate::environment::scoped_test_environment;
use crate::errors::Result;
use crate::models::RunnerResult;
use crate::privilege::scoped_privilege_elevation;
use crate::runners::{RunContext, Runner, Tally, announce, display_results, report_case};
use crate::sidecar::{self, RUNNER_OUTPUT_ENV};

/// Grades by executing the assignment's script. The script reports each
/// case through `coursework-score`.
pub struct CmdRunner<'a> {
    context: RunContext<'a>,
}

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

enum ScriptExit {
    Finished(ExitStatus),
    TimedOut(Duration),
}

impl<'a> CmdRunner<'a> {
    pub fn new(context: RunContext<'a>) -> Self {
        Self { context }
    }
}

impl Runner for CmdRunner<'_> {
    fn run(&self, output: &mut dyn OutputSink) -> Result<RunnerResult> {
        let assignment = self.context.assignment;
        // Resolve before the working directory changes underneath us.
        let script = std::path::absolute(&assignment.test.filename)?;
        let timeout = assignment.test.timeout_secs.map(Duration::from_secs);

        let (exit, contents) = {
            let _identity = scoped_privilege_elevation()?;
            let side_channel = tempfile::Builder::new().prefix("coursework-score-").tempfile()?;

            let exit = {
                let _environment = scoped_test_environment(&self.context.files)?;
                run_script(&script, side_channel.path(), timeout, output)?
            };

            (exit, fs::read(side_channel.path())?)
        };

        match exit {
            ScriptExit::Finished(status) if !status.success() => {
                log::warn!("{} exited with {}", script.display(), status);
                output.write_line(Style::Failure, &format!("Grading script exited with {}", status));
            }
            ScriptExit::Finished(_) => {}
            ScriptExit::TimedOut(limit) => {
                log::warn!("{} killed after {:?}", script.display(), limit);
                output.write_line(
                    Style::Failure,
                    &format!("Grading script timed out after {}s and was stopped", limit.as_secs()),
                );
            }
        }

        let mut test_case_results = Vec::new();
        for (index, record) in sidecar::decode_records(&contents).into_iter().enumerate() {
            match record {
                Ok(result) => test_case_results.push(result),
                Err(e) => log::warn!("skipping undecodable score record #{}: {}", index + 1, e),
            }
        }
        log::debug!("decoded {} score records", test_case_results.len());

        if test_case_results.is_empty() {
            log::warn!("{} reported no scores", script.display());
        }

        let mut tally = Tally::default();
        output.rule(Some(&assignment.name));
        for result in &test_case_results {
            announce(output, &result.name);
            report_case(output, result, None);
            tally.record(result);
        }

        display_results(output, assignment, &tally);
        log::info!(
            "{} earned {}/{} on {}",
            self.context.user.name, tally.earned_points, assignment.total_points, assignment.name
        );

        Ok(self.context.finish(test_case_results))
    }
}

/// Spawn the script with stdout and stderr merged into one pipe, stream its
/// output line by line, and wait for it to exit.
///
/// The script leads its own process group. With a timeout, the whole group is
/// killed once the deadline passes, even when the script has already closed
/// its output.
fn run_script(
    script: &Path,
    side_channel: &Path,
    timeout: Option<Duration>,
    output: &mut dyn OutputSink,
) -> Result<ScriptExit> {
    let (reader, writer) = io::pipe()?;

    let mut command = Command::new(script);
    command
        .env(RUNNER_OUTPUT_ENV, side_channel)
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer)
        .process_group(0);
    let mut child = command.spawn()?;
    // The command still owns our copies of the write end; without dropping
    // it the reader never sees EOF.
    drop(command);
    log::debug!("spawned {} (pid {})", script.display(), child.id());

    let (tx, rx) = mpsc::channel();
    let forwarder = thread::spawn(move || forward_lines(reader, tx));
    let deadline = timeout.map(|limit| Instant::now() + limit);

    loop {
        let next = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(line) => output.plain(&line),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                return stop_group(&mut child, script, timeout.unwrap_or_default());
            }
        }
    }

    let status = match deadline {
        Some(deadline) => loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                return stop_group(&mut child, script, timeout.unwrap_or_default());
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        },
        None => child.wait()?,
    };

    if forwarder.join().is_err() {
        log::warn!("output forwarder for {} panicked", script.display());
    }

    Ok(ScriptExit::Finished(status))
}

/// Kill the script's process group and reap the script.
///
/// The forwarder thread is not joined: a descendant that moved to another
/// group may still hold the pipe open.
fn stop_group(child: &mut Child, script: &Path, limit: Duration) -> Result<ScriptExit> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: plain syscall without pointer arguments; the group was created
    // for this child at spawn time and the child is not yet reaped.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        log::warn!(
            "failed to kill process group of {}: {}",
            script.display(),
            io::Error::last_os_error()
        );
        if let Err(e) = child.kill() {
            log::warn!("failed to kill {}: {}", script.display(), e);
        }
    }
    child.wait()?;
    Ok(ScriptExit::TimedOut(limit))
}

fn forward_lines(reader: io::PipeReader, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                if tx.send(line.trim_end_matches(['\n', '\r']).to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("failed to read grading script output: {}", e);
                break;
            }
        }
    }
}
