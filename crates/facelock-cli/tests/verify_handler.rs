use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use facelock_cli::cli::{EncoderArgs, OutputMode, VerifyArgs};
use facelock_cli::commands::{CommandHandler, VerifyHandler};
use facelock_cli::errors::AppError;
use facelock_cli::faces::{VerificationOutcome, VerificationSummary};

fn sample_args() -> VerifyArgs {
    VerifyArgs {
        profile: PathBuf::from("alice.json"),
        image: PathBuf::from("live.png"),
        pose: None,
        payload: false,
        track_attempts: false,
        encoder: EncoderArgs::default(),
    }
}

fn outcome(matched: bool) -> VerificationOutcome {
    VerificationOutcome {
        summary: VerificationSummary {
            profile_path: "alice.json".into(),
            matched,
            face_matched: matched,
            decision: None,
            pose_matched: None,
            failed_attempts: 0,
            checked_at: "2024-01-01T00:00:00.000Z".into(),
        },
        logs: vec![],
    }
}

#[test]
fn verify_handler_succeeds_on_match() {
    let render_calls = Arc::new(Mutex::new(0));
    let handler = VerifyHandler::with_dependencies(sample_args(), |_args| Ok(outcome(true)), {
        let render_calls = Arc::clone(&render_calls);
        move |_outcome, _mode, _verbose| {
            *render_calls.lock().unwrap() += 1;
            Ok(())
        }
    });

    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(*render_calls.lock().unwrap(), 1);
}

#[test]
fn verify_handler_reports_rejection_through_exit_code() {
    let handler = VerifyHandler::with_dependencies(
        sample_args(),
        |_args| Ok(outcome(false)),
        |outcome, _mode, _verbose| {
            assert!(!outcome.summary.matched);
            Ok(())
        },
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::from(1));
}

#[test]
fn verify_handler_surfaces_errors() {
    let handler = VerifyHandler::with_dependencies(
        sample_args(),
        |args| {
            Err(AppError::MissingInput {
                path: args.profile.clone(),
            })
        },
        |_outcome, _mode, _verbose| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    match err {
        AppError::MissingInput { path } => assert_eq!(path, PathBuf::from("alice.json")),
        other => panic!("unexpected error: {other}"),
    }
}
