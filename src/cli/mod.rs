pub mod chat;

use std::ffi::OsString;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

use crate::conversation::{
    ChatOutcome, CompletionSettings, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use crate::openai_client::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

pub const USAGE: &str = "Usage: leo-pet-backend <api_key> <message>";

const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API key followed by the message. Everything after the API key is taken
    /// literally, so messages may start with '-'. An empty API key falls back
    /// to OPENAI_API_KEY.
    #[arg(
        value_name = "API_KEY> <MESSAGE",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,

    /// Start a chat session that keeps context between messages
    #[arg(short, long)]
    pub interactive: bool,

    /// Chat model to use
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum number of tokens in a reply
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Sampling temperature, between 0 and 2
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, value_parser = parse_temperature)]
    pub temperature: f32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Enable verbose logging (written to stderr)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn api_key(&self) -> Option<String> {
        self.args.first().cloned()
    }

    pub fn message(&self) -> Option<String> {
        self.args.get(1).cloned()
    }

    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Why argument parsing stopped short of a runnable [`Cli`].
#[derive(Debug)]
pub enum ArgsError {
    /// `--help` or `--version`: print clap's text as usual.
    Display(clap::Error),
    /// Anything else: report a result object the host can parse.
    Failure(ChatOutcome),
}

impl ArgsError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ArgsError::Display(e) if e.exit_code() == 0 => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        }
    }
}

/// Parses the command line, turning every argument error into a failure
/// outcome.
pub fn parse_args<I, T>(args: I) -> Result<Cli, ArgsError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ArgsError::Display(e),
        _ => {
            let rendered = e.to_string();
            let reason = rendered
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ");
            ArgsError::Failure(usage_failure(reason))
        }
    })?;

    if let Some(extra) = cli.args.get(2) {
        return Err(ArgsError::Failure(usage_failure(&format!(
            "unexpected argument '{extra}' found"
        ))));
    }

    Ok(cli)
}

fn usage_failure(reason: &str) -> ChatOutcome {
    ChatOutcome::failure(format!("{USAGE} ({reason})"))
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let temperature: f32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(format!("temperature must be between 0 and {MAX_TEMPERATURE}"));
    }
    Ok(temperature)
}
