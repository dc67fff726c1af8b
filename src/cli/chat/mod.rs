pub mod prompt;

use std::io::Write;
use std::process::ExitCode;

use color_print::cformat;
use eyre::Result;
use prompt::PROMPT;
use rustyline::error::ReadlineError;
use tracing::{error, info};

use crate::cli::USAGE;
use crate::conversation::{ChatOutcome, CompletionSettings, ConversationClient};
use crate::openai_client::ChatTransport;

const WELCOME_TEXT: &str = "
Hi, I'm Leo Pet, your AI buddy. Ask me anything.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Leo Pet

/history      Show the conversation so far
/clear        Clear the conversation history
/help         Show this help dialogue
/quit         Quit the application
";

/// Drives one process invocation: either a single message answered with a
/// JSON line, or an interactive session sharing one conversation.
pub struct ChatContext {
    output: Box<dyn Write>,
    api_key: Option<String>,
    input: Option<String>,
    interactive: bool,
    settings: CompletionSettings,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        api_key: Option<String>,
        input: Option<String>,
        interactive: bool,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            output,
            api_key,
            input,
            interactive,
            settings,
        }
    }

    /// Runs the session. `make_transport` is only called once the arguments
    /// have been validated.
    pub async fn run<T, F>(&mut self, make_transport: F) -> Result<ExitCode>
    where
        T: ChatTransport,
        F: FnOnce() -> Result<T>,
    {
        if !self.interactive && (self.api_key.is_none() || self.input.is_none()) {
            self.write_outcome(&ChatOutcome::failure(USAGE))?;
            return Ok(ExitCode::FAILURE);
        }

        let transport = match make_transport() {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to initialize OpenAI client: {:#}", e);
                self.report_startup_failure(&format!("{e:#}"))?;
                return Ok(ExitCode::FAILURE);
            }
        };

        let mut client = match ConversationClient::with_settings(
            self.api_key.take(),
            transport,
            self.settings.clone(),
        ) {
            Ok(client) => client,
            Err(e) => {
                error!(kind = e.kind(), "Failed to create conversation client");
                self.report_startup_failure(&e.to_string())?;
                return Ok(ExitCode::FAILURE);
            }
        };

        if !self.interactive {
            if let Some(input) = self.input.take() {
                let outcome = client.send(&input).await;
                self.write_outcome(&outcome)?;
            }
            return Ok(ExitCode::SUCCESS);
        }

        self.print_welcome()?;

        if let Some(input) = self.input.take() {
            self.process_chat_input(&mut client, &input).await?;
        }

        self.run_interactive(&mut client).await?;

        Ok(ExitCode::SUCCESS)
    }

    fn write_outcome(&mut self, outcome: &ChatOutcome) -> Result<()> {
        writeln!(self.output, "{}", outcome.to_json_line()?)?;
        self.output.flush()?;
        Ok(())
    }

    fn report_startup_failure(&mut self, message: &str) -> Result<()> {
        if self.interactive {
            writeln!(self.output, "Failed to start chat: {}", message)?;
            Ok(())
        } else {
            self.write_outcome(&ChatOutcome::failure(message))
        }
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive<T: ChatTransport>(
        &mut self,
        client: &mut ConversationClient<T>,
    ) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if !self.handle_input(client, &line).await? {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        info!("Chat session ended");
        Ok(())
    }

    /// Handles one line of interactive input. Returns `false` when the
    /// session should end.
    async fn handle_input<T: ChatTransport>(
        &mut self,
        client: &mut ConversationClient<T>,
        input: &str,
    ) -> Result<bool> {
        match input.trim() {
            "/quit" => return Ok(false),
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                client.clear();
                writeln!(self.output, "Conversation cleared.")?;
            }
            "/history" => {
                self.print_history(client)?;
            }
            _ => {
                self.process_chat_input(client, input).await?;
            }
        }

        Ok(true)
    }

    async fn process_chat_input<T: ChatTransport>(
        &mut self,
        client: &mut ConversationClient<T>,
        input: &str,
    ) -> Result<()> {
        match client.send(input).await {
            ChatOutcome::Success { reply } => {
                writeln!(
                    self.output,
                    "{}",
                    cformat!("<green><bold>Leo Pet:</bold></green> {}", reply)
                )?;
            }
            ChatOutcome::Failure { error_message } => {
                writeln!(self.output, "{}", cformat!("<red>Error:</red> {}", error_message))?;
            }
        }
        Ok(())
    }

    fn print_history<T: ChatTransport>(&mut self, client: &ConversationClient<T>) -> Result<()> {
        let history = client.history();
        if history.is_empty() {
            writeln!(self.output, "No messages yet.")?;
            return Ok(());
        }

        for message in &history {
            writeln!(self.output, "[{}] {}", message.role().as_str(), message.content())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::conversation::ChatError;
    use crate::openai_client::{ChatRequest, RawResponse};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Answers every request with the same status and body.
    struct FixedTransport {
        status: u16,
        body: String,
    }

    impl FixedTransport {
        fn reply(content: &str) -> Self {
            Self {
                status: 200,
                body: json!({"choices": [{"message": {"content": content}}]}).to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FixedTransport {
        async fn post_chat(
            &self,
            _api_key: &str,
            _request: &ChatRequest,
        ) -> Result<RawResponse, ChatError> {
            Ok(RawResponse::new(self.status, self.body.clone()))
        }
    }

    fn context(
        buffer: &SharedBuffer,
        api_key: Option<&str>,
        input: Option<&str>,
        interactive: bool,
    ) -> ChatContext {
        ChatContext::new(
            Box::new(buffer.clone()),
            api_key.map(str::to_string),
            input.map(str::to_string),
            interactive,
            CompletionSettings::default(),
        )
    }

    fn single_json_line(buffer: &SharedBuffer) -> Value {
        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1, "expected one line, got {contents:?}");
        serde_json::from_str(lines[0]).unwrap()
    }

    #[tokio::test]
    async fn one_shot_prints_success_json() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-test"), Some("hello"), false);

        let code = ctx.run(|| Ok(FixedTransport::reply("Hi there!"))).await.unwrap();

        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(
            single_json_line(&buffer),
            json!({"success": true, "response": "Hi there!", "error": null})
        );
    }

    #[tokio::test]
    async fn one_shot_prints_provider_failure_json() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-bad"), Some("hello"), false);

        let code = ctx
            .run(|| {
                Ok(FixedTransport {
                    status: 401,
                    body: r#"{"error": {"message": "invalid_api_key"}}"#.to_string(),
                })
            })
            .await
            .unwrap();

        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(
            single_json_line(&buffer),
            json!({"success": false, "response": null, "error": "API Error: invalid_api_key"})
        );
    }

    #[tokio::test]
    async fn missing_arguments_print_usage_and_fail() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-test"), None, false);
        let mut transport_built = false;

        let code = ctx
            .run(|| {
                transport_built = true;
                Ok(FixedTransport::reply("unused"))
            })
            .await
            .unwrap();

        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
        assert!(!transport_built);
        assert_eq!(
            single_json_line(&buffer),
            json!({"success": false, "response": null, "error": USAGE})
        );
    }

    #[tokio::test]
    async fn transport_setup_failure_is_structured() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-test"), Some("hello"), false);

        let code = ctx
            .run(|| -> Result<FixedTransport> { Err(eyre::eyre!("Invalid base URL: nope")) })
            .await
            .unwrap();

        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
        let value = single_json_line(&buffer);
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["response"], Value::Null);
        assert_eq!(value["error"], json!("Invalid base URL: nope"));
    }

    #[tokio::test]
    async fn interactive_commands_drive_the_conversation() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-test"), None, true);
        let mut client = ConversationClient::with_settings(
            Some("sk-test".to_string()),
            FixedTransport::reply("Hello, friend!"),
            CompletionSettings::default(),
        )
        .unwrap();

        assert!(ctx.handle_input(&mut client, "hi Leo").await.unwrap());
        assert!(ctx.handle_input(&mut client, "/history").await.unwrap());
        assert_eq!(client.history().len(), 2);

        assert!(ctx.handle_input(&mut client, "/clear").await.unwrap());
        assert!(client.history().is_empty());
        assert!(ctx.handle_input(&mut client, "/history").await.unwrap());

        assert!(!ctx.handle_input(&mut client, "/quit").await.unwrap());

        let contents = buffer.contents();
        assert!(contents.contains("Hello, friend!"));
        assert!(contents.contains("[user] hi Leo"));
        assert!(contents.contains("[assistant] Hello, friend!"));
        assert!(contents.contains("Conversation cleared."));
        assert!(contents.contains("No messages yet."));
    }

    #[tokio::test]
    async fn interactive_failures_are_printed_as_text() {
        let buffer = SharedBuffer::default();
        let mut ctx = context(&buffer, Some("sk-test"), None, true);
        let mut client = ConversationClient::with_settings(
            Some("sk-test".to_string()),
            FixedTransport {
                status: 503,
                body: "unavailable".to_string(),
            },
            CompletionSettings::default(),
        )
        .unwrap();

        assert!(ctx.handle_input(&mut client, "hi").await.unwrap());
        assert!(buffer.contents().contains("API Error: HTTP 503: unavailable"));
        assert_eq!(client.history().len(), 1);
    }
}
