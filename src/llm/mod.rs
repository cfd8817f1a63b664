pub mod chat;

use std::sync::Arc;

use crate::config::prompt::DEFAULT_SYSTEM_INSTRUCTION;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-3.1-pro-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub system_instruction: Arc<str>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: None,
            base_url: None,
            system_instruction: Arc::from(DEFAULT_SYSTEM_INSTRUCTION),
        }
    }
}
