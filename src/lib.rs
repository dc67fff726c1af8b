//! Chat backend for the Leo Pet desktop companion.
//!
//! The host application runs the binary once per message with an API key
//! and the message text, and reads back a single JSON object.

pub mod cli;
pub mod conversation;
pub mod openai_client;
