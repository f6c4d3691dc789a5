pub mod output;
pub mod progress;
pub mod signals;

pub use output::{OutputFormatter, OutputMode, ProgressAwareOutput};
pub use progress::{ProgressManager, ProgressReporter, ProgressSnapshot, ProgressState, SharedProgress};
pub use signals::GracefulShutdown;
