use rustyline::{CompletionType, Config, Editor, Result};

pub const PROMPT: &str = "you> ";

/// Line editor for the interactive session. Input history lives only in
/// memory and is dropped on exit.
pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .completion_type(CompletionType::List)
        .build();
    Editor::with_config(config)
}
