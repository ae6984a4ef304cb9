use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod enroll;
mod extract;
mod identify;
mod pose;
mod verify;

pub use enroll::EnrollHandler;
pub use extract::ExtractHandler;
pub use identify::IdentifyHandler;
pub use pose::PoseHandler;
pub use verify::VerifyHandler;

/// Exit code for a completed check that did not match.
pub const NO_MATCH_EXIT: u8 = 1;

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Extract(args) => Box::new(ExtractHandler::new(args)),
            Commands::Enroll(args) => Box::new(EnrollHandler::new(args)),
            Commands::Verify(args) => Box::new(VerifyHandler::new(args)),
            Commands::Identify(args) => Box::new(IdentifyHandler::new(args)),
            Commands::Pose(args) => Box::new(PoseHandler::new(args)),
        }
    }
}
