pub mod gemini;

use async_trait::async_trait;
use futures::{ Stream, StreamExt, Future };
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::{ debug, warn };

use super::LlmConfig;
use self::gemini::GeminiChatClient;
use crate::error::ChatError;
use crate::models::chat::HistoryItem;

/// One incremental piece of model output. `text` may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// Ordered, finite sequence of chunks. An `Err` item ends the sequence.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, ChatError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<CompletionResponse, ChatError>;

    async fn stream_send(
        &self,
        prompt: &str,
        history: &[HistoryItem]
    ) -> Result<ChunkStream, ChatError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> ChunkStream
    where
        F: FnOnce(mpsc::Sender<Result<Chunk, ChatError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client: Arc<dyn ChatClient> = Arc::new(GeminiChatClient::from_config(config)?);
    Ok(client)
}

/// Splits a byte stream into lines. Bytes are held until a newline arrives,
/// so a line (or a multi-byte character) split across network reads is
/// reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).trim_end_matches('\r').to_string();
        self.pending.clear();
        Some(text)
    }
}

/// Line parser result: `None` skips the line, `Some(Err)` ends the stream.
pub type LineParser = fn(&str) -> Option<Result<Chunk, ChatError>>;

pub fn http_stream_generate(
    client: reqwest::Client,
    url: String,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: LineParser,
    headers: Option<Vec<(String, String)>>
) -> ChunkStream {
    create_streaming_response(move |tx| async move {
        let mut req = client.post(&url).json(&payload);

        if let Some(header_list) = headers {
            for (name, value) in header_list {
                req = req.header(name, value);
            }
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let _ = tx.send(Err(ChatError::Http(e))).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Streaming request failed with status {}", status);
            let _ = tx.send(Err(ChatError::Status { status, body })).await;
            return;
        }

        let mut lines = LineBuffer::new();
        let mut bytes = resp.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        if !forward_line(&tx, line_parser, &line).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(ChatError::Http(e))).await;
                    return;
                }
            }
        }

        if let Some(rest) = lines.finish() {
            forward_line(&tx, line_parser, &rest).await;
        }
        debug!("Stream from {} finished", url.split('?').next().unwrap_or_default());
    })
}

/// Returns false once the stream should stop: the receiver went away or the
/// parser produced an error.
async fn forward_line(
    tx: &mpsc::Sender<Result<Chunk, ChatError>>,
    line_parser: LineParser,
    line: &str
) -> bool {
    match line_parser(line) {
        Some(Ok(chunk)) => tx.send(Ok(chunk)).await.is_ok(),
        Some(Err(e)) => {
            let _ = tx.send(Err(e)).await;
            false
        }
        None => true,
    }
}
