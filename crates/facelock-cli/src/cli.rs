use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facelock",
    about = "Extract face embeddings and make match decisions against enrolled profiles",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Extract a face embedding from an image
    Extract(ExtractArgs),
    /// Aggregate several samples into a profile's reference embedding
    Enroll(EnrollArgs),
    /// Check a live image (and optional pose) against one profile
    Verify(VerifyArgs),
    /// Find the best matching profile in a gallery directory
    Identify(IdentifyArgs),
    /// Compare two head positions with fixed tolerances
    Pose(PoseArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct EncoderArgs {
    /// Path to the dlib landmark predictor model (falls back to config, then $DLIB_LANDMARK_MODEL)
    #[arg(long)]
    pub landmark_model: Option<PathBuf>,

    /// Path to the dlib face recognition network (falls back to config, then $DLIB_ENCODER_MODEL)
    #[arg(long)]
    pub encoder_model: Option<PathBuf>,

    /// Number of image jitters to run before encoding
    #[arg(long)]
    pub jitters: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Image file, or a text file holding a base64 payload when --payload is set
    pub image: PathBuf,

    /// Treat inputs as base64 payload text (optionally "<header>,<data>")
    #[arg(long)]
    pub payload: bool,

    /// Optional JSON file to write the embedding to
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    /// Profile JSON to create or update
    #[arg(long)]
    pub profile: PathBuf,

    /// Sample images (or payload files with --payload)
    #[arg(required = true)]
    pub samples: Vec<PathBuf>,

    /// Treat inputs as base64 payload text (optionally "<header>,<data>")
    #[arg(long)]
    pub payload: bool,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// Profile JSON of the claimed user
    #[arg(long)]
    pub profile: PathBuf,

    /// Live image (or payload file with --payload)
    pub image: PathBuf,

    /// Live head position JSON ({x,y,scale} or {roll,pitch,yaw,dist})
    #[arg(long)]
    pub pose: Option<PathBuf>,

    /// Treat inputs as base64 payload text (optionally "<header>,<data>")
    #[arg(long)]
    pub payload: bool,

    /// Update the profile's failed-attempt counter with the result
    #[arg(long)]
    pub track_attempts: bool,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Debug, Clone, Args)]
pub struct IdentifyArgs {
    /// Directory of profile JSON files (defaults to the configured profile_dir)
    #[arg(long)]
    pub gallery: Option<PathBuf>,

    /// Live image (or payload file with --payload)
    pub image: PathBuf,

    /// Override the gallery distance tolerance
    #[arg(long)]
    pub tolerance: Option<f32>,

    /// Treat inputs as base64 payload text (optionally "<header>,<data>")
    #[arg(long)]
    pub payload: bool,

    #[command(flatten)]
    pub encoder: EncoderArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PoseArgs {
    /// Stored position JSON
    #[arg(long)]
    pub stored: PathBuf,

    /// Live position JSON
    #[arg(long)]
    pub live: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}
