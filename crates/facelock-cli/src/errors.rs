pub use facelock_core::errors::{AppError, AppResult};
