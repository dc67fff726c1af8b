use std::env;
use std::io;
use std::process::ExitCode;

use dotenv::dotenv;
use eyre::{eyre, Result};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

use leo_pet_backend::cli::chat::ChatContext;
use leo_pet_backend::cli::{parse_args, ArgsError};
use leo_pet_backend::openai_client::OpenAiClient;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = match parse_args(env::args_os()) {
        Ok(cli) => cli,
        Err(ArgsError::Display(e)) => e.exit(),
        Err(err) => {
            // The host parses whatever we print, so argument errors still
            // have to come out as a result object.
            if let ArgsError::Failure(outcome) = &err {
                println!("{}", outcome.to_json_line()?);
            }
            return Ok(err.exit_code());
        }
    };

    // stdout and stderr share one pipe on the host side, so one-shot runs
    // stay silent unless asked otherwise.
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else if cli.interactive {
        LevelFilter::INFO
    } else {
        LevelFilter::OFF
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("Failed to set tracing subscriber: {}", e))?;

    info!("Starting Leo Pet backend");

    let openai_config = cli.openai_config();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        cli.api_key(),
        cli.message(),
        cli.interactive,
        cli.completion_settings(),
    );
    chat_context.run(|| OpenAiClient::new(&openai_config)).await
}
