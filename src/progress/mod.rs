//! Progress reporting for pipeline runs

mod handler;
mod logging;

pub use handler::{LogScope, NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
