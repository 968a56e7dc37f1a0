use chrono::{DateTime, Utc};
use lugha_lml::quote_string;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    Tool,
}

/// One chat turn. `message` is LML source; it grows in place while streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub transient: bool,
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    pub fn new(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            message: message.into(),
            chat_id: None,
            created_at: Utc::now(),
            transient: false,
            streaming: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn in_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Empty assistant message that a stream will fill.
    pub fn streaming_reply(chat_id: Option<String>) -> Self {
        Self {
            chat_id,
            streaming: true,
            transient: true,
            ..Self::new(Sender::Assistant, String::new())
        }
    }

    /// Whether there is anything to render yet.
    pub fn has_content(&self) -> bool {
        !self.message.trim().is_empty()
    }
}

/// Wraps raw user input as a one-paragraph LML document.
pub fn user_prompt(text: &str) -> String {
    format!("p {{ {} }}", quote_string(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_prompt_is_a_paragraph() {
        assert_eq!(user_prompt("hello"), "p { `hello` }");
        let doc = lugha_lml::parse(&user_prompt("a `tick` and \\ slash")).unwrap();
        assert_eq!(doc.text(), "a `tick` and \\ slash");
    }

    #[test]
    fn test_streaming_reply_starts_empty() {
        let m = Message::streaming_reply(Some("c1".into()));
        assert_eq!(m.sender, Sender::Assistant);
        assert!(m.streaming);
        assert!(!m.has_content());
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let m = Message::new(Sender::Tool, "x").with_id("m1");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["sender"], "tool");
        assert_eq!(json["id"], "m1");
        assert!(json.get("chat_id").is_none());
    }
}
