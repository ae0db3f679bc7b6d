// src/sidecar.rs
//! The side channel external grading scripts report through.
//!
//! The `cmd` runner points `COURSEWORK_RUNNER_OUTPUT` at a scratch file and
//! every `coursework-score` call appends one encoded [`TestCaseResult`]
//! followed by [`DELIMITER`]. Records are encoded so the delimiter can never
//! occur inside one (see [`TestCaseResult::to_record`]).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::errors::Result;
use crate::models::TestCaseResult;

/// Environment variable naming the side-channel file.
pub const RUNNER_OUTPUT_ENV: &str = "COURSEWORK_RUNNER_OUTPUT";

/// Written after every record.
pub const DELIMITER: &[u8] = b"SPLIT";

/// Append one result to the side-channel file, creating it if needed.
pub fn append_score(target: &Path, result: &TestCaseResult) -> Result<()> {
    let mut record = result.to_record()?;
    record.extend_from_slice(DELIMITER);

    let mut file = OpenOptions::new().create(true).append(true).open(target)?;
    // One write per record keeps concurrent appenders from interleaving.
    file.write_all(&record)?;
    file.flush()?;
    Ok(())
}

/// Split a side-channel stream into records.
///
/// The segment after the final delimiter is dropped: it is empty for a
/// well-formed stream and a truncated record otherwise.
pub fn split_records(contents: &[u8]) -> Vec<&[u8]> {
    let mut records = Vec::new();
    let mut rest = contents;

    while let Some(at) = rest.windows(DELIMITER.len()).position(|w| w == DELIMITER) {
        records.push(&rest[..at]);
        rest = &rest[at + DELIMITER.len()..];
    }

    if !rest.is_empty() {
        log::warn!("discarding {} bytes of unterminated side-channel output", rest.len());
    }
    records
}

/// Decode every record in order. Undecodable records are returned as errors
/// in their position so the caller can report them.
pub fn decode_records(contents: &[u8]) -> Vec<Result<TestCaseResult>> {
    split_records(contents)
        .into_iter()
        .map(TestCaseResult::from_record)
        .collect()
}
