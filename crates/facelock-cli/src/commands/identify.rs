use std::any::Any;
use std::process::ExitCode;

use crate::cli::{IdentifyArgs, OutputMode};
use crate::commands::{CommandHandler, NO_MATCH_EXIT};
use crate::errors::AppResult;
use crate::faces::{self, IdentificationOutcome};
use crate::output::render_identify;

pub struct IdentifyHandler {
    args: IdentifyArgs,
    run: Box<dyn Fn(&IdentifyArgs) -> AppResult<IdentificationOutcome> + Send + Sync>,
    render: Box<dyn Fn(&IdentificationOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl IdentifyHandler {
    pub fn new(args: IdentifyArgs) -> Self {
        Self::with_dependencies(args, faces::run_identify, render_identify)
    }

    pub fn with_dependencies(
        args: IdentifyArgs,
        run: impl Fn(&IdentifyArgs) -> AppResult<IdentificationOutcome> + Send + Sync + 'static,
        render: impl Fn(&IdentificationOutcome, OutputMode, bool) -> AppResult<()>
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

impl CommandHandler for IdentifyHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        if outcome.summary.identity.is_some() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(NO_MATCH_EXIT))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
