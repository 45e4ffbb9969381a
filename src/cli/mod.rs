pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AnalyzeArgs, CliArgs, Commands, HealthArgs, OutputFormatArg, PromptsArgs};
pub use handlers::{handle_analyze, handle_health, handle_prompts};
pub use output::{HealthStatus, OutputFormat, OutputFormatter};
