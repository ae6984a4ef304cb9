use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, VerifyArgs};
use crate::commands::{CommandHandler, NO_MATCH_EXIT};
use crate::errors::AppResult;
use crate::faces::{self, VerificationOutcome};
use crate::output::render_verify;

pub struct VerifyHandler {
    args: VerifyArgs,
    run: Box<dyn Fn(&VerifyArgs) -> AppResult<VerificationOutcome> + Send + Sync>,
    render: Box<dyn Fn(&VerificationOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl VerifyHandler {
    pub fn new(args: VerifyArgs) -> Self {
        Self::with_dependencies(args, faces::run_verify, render_verify)
    }

    pub fn with_dependencies(
        args: VerifyArgs,
        run: impl Fn(&VerifyArgs) -> AppResult<VerificationOutcome> + Send + Sync + 'static,
        render: impl Fn(&VerificationOutcome, OutputMode, bool) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for VerifyHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        if outcome.summary.matched {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(NO_MATCH_EXIT))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
