use std::any::Any;
use std::process::ExitCode;

use crate::cli::{ExtractArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::faces::{self, ExtractionOutcome};
use crate::output::render_extract;

pub struct ExtractHandler {
    args: ExtractArgs,
    run: Box<dyn Fn(&ExtractArgs) -> AppResult<ExtractionOutcome> + Send + Sync>,
    render: Box<dyn Fn(&ExtractionOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl ExtractHandler {
    pub fn new(args: ExtractArgs) -> Self {
        Self::with_dependencies(args, faces::run_extract, render_extract)
    }

    pub fn with_dependencies(
        args: ExtractArgs,
        run: impl Fn(&ExtractArgs) -> AppResult<ExtractionOutcome> + Send + Sync + 'static,
        render: impl Fn(&ExtractionOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for ExtractHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
