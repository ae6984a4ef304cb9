use std::error::Error;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::json;

use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::faces::{
    EnrollmentOutcome, ExtractionOutcome, IdentificationOutcome, PoseOutcome, VerificationOutcome,
};

fn write_json<T: Serialize>(summary: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(summary)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn print_logs(logs: &[String], verbose: bool) {
    if verbose {
        for line in logs {
            println!("{line}");
        }
    }
}

pub fn render_extract(outcome: &ExtractionOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs, verbose);
            match &outcome.summary.output_path {
                Some(path) => println!(
                    "Extraction successful: {} ({:?}, {} values) -> {path}",
                    outcome.summary.input, outcome.summary.kind, outcome.summary.embedding_len
                ),
                None => println!(
                    "Extraction successful: {} ({:?}, {} values)",
                    outcome.summary.input, outcome.summary.kind, outcome.summary.embedding_len
                ),
            }
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_enroll(outcome: &EnrollmentOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs, verbose);
            println!(
                "Enrolled {} of {} sample(s) into {}",
                outcome.summary.sample_count, outcome.summary.submitted, outcome.summary.profile_path
            );
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_verify(outcome: &VerificationOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs, verbose);
            if outcome.summary.matched {
                println!("Verified against {}", outcome.summary.profile_path);
            } else {
                println!("No match against {}", outcome.summary.profile_path);
            }
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_identify(
    outcome: &IdentificationOutcome,
    mode: OutputMode,
    verbose: bool,
) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs, verbose);
            match &outcome.summary.identity {
                Some(identity) => println!(
                    "Identified {identity} (confidence {:.3})",
                    outcome.summary.confidence
                ),
                None => println!(
                    "No match among {} candidate(s)",
                    outcome.summary.candidates
                ),
            }
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_pose(outcome: &PoseOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs, verbose);
            println!(
                "Pose {}",
                if outcome.summary.matched {
                    "consistent"
                } else {
                    "inconsistent"
                }
            );
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "status": "error",
                "error": err.human_message(),
            });
            println!("{payload}");
        }
    }
}
