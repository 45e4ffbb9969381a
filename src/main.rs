use irisflow::cli::commands::{CliArgs, Commands};
use irisflow::cli::handlers::{handle_analyze, handle_health, handle_prompts};
use irisflow::util::logging::{init_logging, parse_level, LoggingConfig};
use irisflow::{NAME, VERSION};

use clap::Parser;
use std::env;
use std::process;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args, args.quiet).await,
        Commands::Prompts(prompts_args) => handle_prompts(prompts_args).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("IRISFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = env::var("IRISFLOW_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..LoggingConfig::default()
    });
}
