use crate::pipeline::Side;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Staged vision-model analysis of iris photographs
#[derive(Parser, Debug)]
#[command(
    name = "irisflow",
    about = "Staged vision-model analysis of iris photographs",
    version,
    author,
    long_about = "irisflow runs an iris photo through seven model-driven stages: geometric \
                  calibration, structural and pigment detection, consistency merge, zone \
                  mapping, profile building and report generation. Any OpenAI-compatible \
                  vision endpoint can serve the stages."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Analyze one iris image",
        long_about = "Runs the full stage pipeline against the configured endpoint and prints \
                      the resulting context.\n\n\
                      Examples:\n  \
                      irisflow analyze --image-url https://host/left.jpg --side left\n  \
                      irisflow analyze --image-url https://host/od.jpg --side right --patient patient.json --format json\n  \
                      irisflow analyze --image-url https://host/os.jpg --side left --parallel -o report.json"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "List the prompt used for each stage",
        long_about = "Shows where each stage's prompt comes from and its checksum.\n\n\
                      Examples:\n  \
                      irisflow prompts\n  \
                      irisflow prompts --prompts-dir ./prompts --format json"
    )]
    Prompts(PromptsArgs),

    #[command(
        about = "Check inference endpoint availability",
        long_about = "Probes the configured OpenAI-compatible endpoint.\n\n\
                      Examples:\n  \
                      irisflow health\n  \
                      irisflow health --format json"
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        long,
        value_name = "URL",
        help = "Iris image as an http(s):// or data: URL"
    )]
    pub image_url: String,

    #[arg(long, value_parser = parse_side, help = "Which eye: left or right")]
    pub side: Side,

    #[arg(
        long,
        value_name = "ID",
        help = "Image identifier (a random one is generated when omitted)"
    )]
    pub img_id: Option<String>,

    #[arg(long, value_name = "FILE", help = "Patient metadata JSON file")]
    pub patient: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'm',
        long,
        value_name = "MODEL",
        help = "Model name (overrides IRISFLOW_MODEL)"
    )]
    pub model: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Prompt override directory (overrides IRISFLOW_PROMPTS_DIR)"
    )]
    pub prompts_dir: Option<PathBuf>,

    #[arg(long, help = "Run structural and pigment detection concurrently")]
    pub parallel: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct PromptsArgs {
    #[arg(
        long,
        value_name = "DIR",
        help = "Prompt override directory (overrides IRISFLOW_PROMPTS_DIR)"
    )]
    pub prompts_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_side(s: &str) -> Result<Side, String> {
    s.parse()
}
