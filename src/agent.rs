use futures::StreamExt;
use log::{ info, debug };
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::config::prompt;
use crate::error::ChatError;
use crate::llm::LlmConfig;
use crate::llm::chat::{ ChatClient, ChunkStream, new_client as new_chat_client };
use crate::models::chat::ChatMessage;
use crate::session::{ ChatSession, Turn, TurnOutcome };

/// Progress notifications emitted while a turn runs, for rendering.
#[derive(Debug)]
pub enum TurnEvent<'a> {
    Started {
        user: &'a ChatMessage,
        placeholder: &'a ChatMessage,
    },
    Delta {
        message: &'a ChatMessage,
        delta: &'a str,
    },
}

/// Drives turns of a `ChatSession` against a provider.
#[derive(Clone)]
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
}

impl ChatAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let system_instruction = prompt::resolve_system_instruction(
            args.system_instruction_path.as_deref()
        )?;
        let api_key = if !args.api_key.is_empty() { Some(args.api_key.clone()) } else { None };
        let chat_config = LlmConfig {
            api_key,
            completion_model: Some(args.chat_model.clone()),
            base_url: Some(args.chat_base_url.clone()),
            system_instruction,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Model={}, BaseURL={}",
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("none")
        );
        Ok(Self::with_client(chat_client))
    }

    pub fn with_client(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client }
    }

    pub async fn open_stream(&self, turn: &Turn) -> Result<ChunkStream, ChatError> {
        self.chat_client.stream_send(&turn.prompt, &turn.history).await
    }

    /// Runs one streamed turn to completion. Returns `Rejected` without side
    /// effects when the session refuses the input.
    pub async fn submit<F>(
        &self,
        session: &mut ChatSession,
        input: &str,
        mut on_event: F
    ) -> TurnOutcome
        where F: FnMut(TurnEvent<'_>)
    {
        let Some(mut turn) = session.begin_turn(input) else {
            return TurnOutcome::Rejected;
        };
        emit_started(session, &turn, &mut on_event);

        let mut stream = match self.open_stream(&turn).await {
            Ok(stream) => stream,
            Err(e) => {
                return session.fail_turn(turn, &e);
            }
        };
        session.stream_opened();

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if session.apply_chunk(&mut turn, &chunk.text) {
                        debug!("Received chunk of {} bytes", chunk.text.len());
                        if let Some(message) = session.conversation().get(&turn.placeholder_id) {
                            on_event(TurnEvent::Delta { message, delta: &chunk.text });
                        }
                    }
                }
                Err(e) => {
                    return session.fail_turn(turn, &e);
                }
            }
        }

        session.finish_turn(turn)
    }

    /// Same state transitions as `submit`, but the reply arrives in one
    /// piece through the provider's non-streaming call.
    pub async fn submit_without_streaming<F>(
        &self,
        session: &mut ChatSession,
        input: &str,
        mut on_event: F
    ) -> TurnOutcome
        where F: FnMut(TurnEvent<'_>)
    {
        let Some(mut turn) = session.begin_turn(input) else {
            return TurnOutcome::Rejected;
        };
        emit_started(session, &turn, &mut on_event);

        match self.chat_client.send(&turn.prompt, &turn.history).await {
            Ok(resp) => {
                if session.apply_chunk(&mut turn, &resp.response) {
                    if let Some(message) = session.conversation().get(&turn.placeholder_id) {
                        on_event(TurnEvent::Delta { message, delta: &resp.response });
                    }
                }
                session.finish_turn(turn)
            }
            Err(e) => session.fail_turn(turn, &e),
        }
    }
}

fn emit_started<F>(session: &ChatSession, turn: &Turn, on_event: &mut F)
    where F: FnMut(TurnEvent<'_>)
{
    let messages = session.conversation().messages();
    if let [.., user, placeholder] = messages {
        if placeholder.id == turn.placeholder_id {
            on_event(TurnEvent::Started { user, placeholder });
        }
    }
}
