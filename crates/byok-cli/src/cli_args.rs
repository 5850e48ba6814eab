use std::path::PathBuf;

use byok_catalog::InvocationMode;
use clap::{ArgAction, Parser, ValueEnum};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliInvocationMode {
    Silent,
    Interactive,
}

impl From<CliInvocationMode> for InvocationMode {
    fn from(value: CliInvocationMode) -> Self {
        match value {
            CliInvocationMode::Silent => InvocationMode::Silent,
            CliInvocationMode::Interactive => InvocationMode::Interactive,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "byok-catalog",
    about = "Resolve the model catalog advertised for a bring-your-own-key provider",
    version
)]
/// Public struct `Cli` used across BYOK components.
pub struct Cli {
    #[arg(
        long,
        env = "BYOK_PROVIDER",
        default_value = "iflow",
        help = "Provider id whose catalog should be resolved. Supported providers: iflow."
    )]
    pub provider: String,

    #[arg(
        long,
        value_enum,
        default_value = "silent",
        help = "silent never prompts; interactive prompts on stdin when no API key is configured"
    )]
    pub mode: CliInvocationMode,

    #[arg(
        long = "api-base",
        env = "BYOK_API_BASE",
        help = "Override the provider's OpenAI-compatible API base used for GET /models"
    )]
    pub api_base: Option<String>,

    #[arg(
        long = "known-models",
        env = "BYOK_KNOWN_MODELS",
        help = "Optional known-models JSON file merged over the built-in defaults"
    )]
    pub known_models: Option<PathBuf>,

    #[arg(
        long = "request-timeout-ms",
        env = "BYOK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for the remote catalog request; a timeout falls back to defaults"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        default_value_t = false,
        action = ArgAction::SetTrue,
        help = "Print the resolved catalog as JSON instead of text lines"
    )]
    pub json: bool,

    #[arg(
        long = "print-events",
        default_value_t = false,
        action = ArgAction::SetTrue,
        help = "Print resolution events as JSON lines on stderr"
    )]
    pub print_events: bool,
}
