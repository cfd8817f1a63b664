#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{ Arc, Mutex };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use darsenizami_chat::error::ChatError;
use darsenizami_chat::llm::chat::{ ChatClient, Chunk, ChunkStream, CompletionResponse };
use darsenizami_chat::models::chat::HistoryItem;

/// What the scripted provider does for one streamed call.
#[derive(Clone, Debug)]
pub enum Step {
    Text(&'static str),
    Fail(&'static str),
}

#[derive(Default)]
pub struct ScriptedClient {
    pub steps: Vec<Step>,
    pub refuse_to_open: bool,
    pub reply: Option<&'static str>,
    pub calls: Mutex<Vec<(String, Vec<HistoryItem>)>>,
}

impl ScriptedClient {
    pub fn streaming(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self { steps, ..Default::default() })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self { refuse_to_open: true, ..Default::default() })
    }

    pub fn replying(reply: &'static str) -> Arc<Self> {
        Arc::new(Self { reply: Some(reply), ..Default::default() })
    }

    pub fn calls(&self) -> Vec<(String, Vec<HistoryItem>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<CompletionResponse, ChatError> {
        self.calls.lock().unwrap().push((prompt.to_string(), history.to_vec()));
        match self.reply {
            Some(text) => Ok(CompletionResponse { response: text.to_string() }),
            None => Err(ChatError::Provider("no reply scripted".into())),
        }
    }

    async fn stream_send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<ChunkStream, ChatError> {
        self.calls.lock().unwrap().push((prompt.to_string(), history.to_vec()));
        if self.refuse_to_open {
            return Err(ChatError::Provider("unauthenticated".into()));
        }
        let items: Vec<Result<Chunk, ChatError>> = self.steps
            .iter()
            .map(|step| match step {
                Step::Text(text) => Ok(Chunk::new(*text)),
                Step::Fail(reason) => Err(ChatError::Provider(reason.to_string())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// Provider whose single stream is fed by the test through a channel.
pub struct GatedClient {
    receiver: Mutex<Option<mpsc::Receiver<Result<Chunk, ChatError>>>>,
}

impl GatedClient {
    pub fn new() -> (Arc<Self>, mpsc::Sender<Result<Chunk, ChatError>>) {
        let (tx, rx) = mpsc::channel(8);
        (Arc::new(Self { receiver: Mutex::new(Some(rx)) }), tx)
    }
}

#[async_trait]
impl ChatClient for GatedClient {
    async fn send(&self, _prompt: &str, _history: &[HistoryItem]) -> Result<CompletionResponse, ChatError> {
        Err(ChatError::Provider("not used".into()))
    }

    async fn stream_send(
        &self,
        _prompt: &str,
        _history: &[HistoryItem]
    ) -> Result<ChunkStream, ChatError> {
        let rx = self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChatError::Provider("stream already taken".into()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn get_model(&self) -> String {
        "gated".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}
