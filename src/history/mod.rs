use log::debug;

use crate::config::prompt::GREETING;
use crate::models::chat::{ ChatMessage, HistoryItem, Role };

/// In-memory conversation for a single session. Insertion order is display
/// order. The log always holds at least the greeting.
#[derive(Clone, Debug)]
pub struct ConversationStore {
    messages: Vec<ChatMessage>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: vec![greeting()],
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Overwrites the content of the message with `id`. Returns false when no
    /// such message exists, which happens if the log was reset mid-stream.
    pub fn replace_content(&mut self, id: &str, new_content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content.clear();
                message.content.push_str(new_content);
                true
            }
            None => {
                debug!("replace_content: message {} not in conversation, ignoring", id);
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(greeting());
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn history_items(&self) -> Vec<HistoryItem> {
        self.messages.iter().map(HistoryItem::from).collect()
    }
}

fn greeting() -> ChatMessage {
    ChatMessage::new(Role::Model, GREETING)
}

pub fn format_history_for_display(store: &ConversationStore) -> String {
    let mut result = String::new();
    for msg in store.messages() {
        let role_display = match msg.role {
            Role::User => "You",
            Role::Model => "Assistant",
        };
        result.push_str(
            &format!(
                "[{}] {}: {}\n",
                msg.timestamp.with_timezone(&chrono::Local).format("%H:%M"),
                role_display,
                msg.content
            )
        );
    }
    result
}
