use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, PoseArgs};
use crate::commands::{CommandHandler, NO_MATCH_EXIT};
use crate::errors::AppResult;
use crate::faces::{self, PoseOutcome};
use crate::output::render_pose;

pub struct PoseHandler {
    args: PoseArgs,
    run: Box<dyn Fn(&PoseArgs) -> AppResult<PoseOutcome> + Send + Sync>,
    render: Box<dyn Fn(&PoseOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl PoseHandler {
    pub fn new(args: PoseArgs) -> Self {
        Self::with_dependencies(args, faces::run_pose, render_pose)
    }

    pub fn with_dependencies(
        args: PoseArgs,
        run: impl Fn(&PoseArgs) -> AppResult<PoseOutcome> + Send + Sync + 'static,
        render: impl Fn(&PoseOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for PoseHandler {
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
