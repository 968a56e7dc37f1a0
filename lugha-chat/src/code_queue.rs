use std::collections::VecDeque;

use lugha_lml::{Node, NodeId};
use tracing::{debug, info, warn};

use crate::backend::{ExecRequest, ExecutionBackend};
use crate::error::{ChatError, ChatResult};
use crate::host::ChatHost;
use crate::message::{Message, Sender};

/// A runnable code fragment found while rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeEntry {
    pub code: String,
    /// The `code` element it came from, within the tree being rendered.
    pub node: Option<NodeId>,
}

/// Runnable blocks collected by one render pass, drained by [`CodeQueue::exec`].
#[derive(Debug, Default)]
pub struct CodeQueue {
    entries: VecDeque<CodeEntry>,
}

impl CodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CodeEntry) {
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeEntry> {
        self.entries.iter()
    }

    /// Runs every queued entry in FIFO order against `ast`, the tree the
    /// entries were collected from.
    ///
    /// For each result: the tool message is pushed into the chat, the
    /// entry's node gets a `filename` attribute if its attribute list lacks
    /// one, and the message is forwarded through the host's send pathway.
    /// A backend execution failure becomes a tool message and the drain goes
    /// on; any other error stops it. The queue is empty afterwards either
    /// way, and effects of entries already processed stay in place.
    ///
    /// Returns whether any attribute was stamped.
    pub async fn exec<B, H>(
        &mut self,
        ast: &mut Node,
        chat_id: &str,
        message_id: &str,
        backend: &B,
        host: &H,
    ) -> ChatResult<bool>
    where
        B: ExecutionBackend + ?Sized,
        H: ChatHost + ?Sized,
    {
        let entries = std::mem::take(&mut self.entries);
        let total = entries.len();
        let mut altered = false;

        for (index, entry) in entries.into_iter().enumerate() {
            debug!(index, total, message_id, "executing queued code");

            let request = ExecRequest {
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
                code: entry.code.clone(),
            };

            let result = match backend.exec(request).await {
                Ok(result) => result,
                Err(ChatError::Execution(reason)) => {
                    warn!(index, %reason, "queued code failed");
                    let report = Message::new(Sender::Tool, failure_message(&reason))
                        .in_chat(chat_id);
                    host.push_message(report).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let tool = Message::new(Sender::Tool, result.message.clone())
                .with_id(result.id.clone())
                .in_chat(chat_id);
            host.push_message(tool.clone()).await?;

            if let (Some(node), Some(filename)) = (entry.node, result.filename.as_deref()) {
                if stamp_filename(ast, node, filename) {
                    altered = true;
                }
            }

            host.send_message(tool).await?;
        }

        if total > 0 {
            info!(total, altered, message_id, "code queue drained");
        }
        Ok(altered)
    }
}

/// Inserts `filename` on the element `node` when it has an attribute list
/// without one. Returns whether the tree changed.
pub fn stamp_filename(ast: &mut Node, node: NodeId, filename: &str) -> bool {
    let Some(element) = ast.find_element_mut(node) else {
        return false;
    };
    match element.attributes.as_mut() {
        Some(attrs) if !attrs.contains_key("filename") => {
            attrs.insert("filename", Node::string(filename));
            true
        }
        _ => false,
    }
}

/// Tool message body reporting a failed run.
pub(crate) fn failure_message(reason: &str) -> String {
    format!("p {{ {} }}", lugha_lml::quote_string(&format!("Execution failed: {}", reason)))
}
