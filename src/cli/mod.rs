pub mod repl;

use clap::Parser;

use crate::llm::{ DEFAULT_CHAT_MODEL, DEFAULT_GEMINI_BASE_URL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API key for the Gemini API
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Model name for chat completion
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Base URL for the Gemini REST API
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub chat_base_url: String,

    /// Optional file whose content replaces the built-in system instruction.
    #[arg(long, env = "SYSTEM_INSTRUCTION_PATH")]
    pub system_instruction_path: Option<String>,

    // --- Session Args ---
    /// Serve chat sessions over WebSocket instead of the interactive terminal.
    #[arg(long, env = "SERVE", default_value = "false")]
    pub serve: bool,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Ask a single question without streaming, print the answer and exit.
    #[arg(long)]
    pub prompt: Option<String>,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
