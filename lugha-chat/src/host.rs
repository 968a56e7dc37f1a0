use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ChatError, ChatResult};
use crate::message::Message;

/// Chat persistence the core calls into but does not own.
#[async_trait]
pub trait ChatHost: Send + Sync {
    async fn edit_message(&self, id: &str, message: &str) -> ChatResult<()>;

    async fn refresh_chat(&self) -> ChatResult<()>;

    async fn push_message(&self, message: Message) -> ChatResult<()>;

    /// Streaming-send pathway: the host posts `message` and appends any
    /// assistant follow-up live.
    async fn send_message(&self, message: Message) -> ChatResult<()>;
}

#[derive(Debug, Default)]
struct MemoryChatInner {
    messages: Vec<Message>,
    sent: Vec<String>,
    refreshes: usize,
}

/// In-process chat store, used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryChat {
    inner: Mutex<MemoryChatInner>,
}

impl MemoryChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            inner: Mutex::new(MemoryChatInner {
                messages,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> ChatResult<std::sync::MutexGuard<'_, MemoryChatInner>> {
        self.inner
            .lock()
            .map_err(|_| ChatError::Host("chat store lock poisoned".to_string()))
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().map(|g| g.messages.clone()).unwrap_or_default()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.lock()
            .ok()
            .and_then(|g| g.messages.iter().find(|m| m.id == id).cloned())
    }

    /// Ids of messages forwarded through `send_message`, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().map(|g| g.sent.clone()).unwrap_or_default()
    }

    pub fn refreshes(&self) -> usize {
        self.lock().map(|g| g.refreshes).unwrap_or_default()
    }
}

#[async_trait]
impl ChatHost for MemoryChat {
    async fn edit_message(&self, id: &str, message: &str) -> ChatResult<()> {
        let mut inner = self.lock()?;
        let target = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ChatError::Host(format!("no message with id {}", id)))?;
        target.message = message.to_string();
        Ok(())
    }

    async fn refresh_chat(&self) -> ChatResult<()> {
        self.lock()?.refreshes += 1;
        Ok(())
    }

    async fn push_message(&self, message: Message) -> ChatResult<()> {
        self.lock()?.messages.push(message);
        Ok(())
    }

    async fn send_message(&self, message: Message) -> ChatResult<()> {
        self.lock()?.sent.push(message.id);
        Ok(())
    }
}
