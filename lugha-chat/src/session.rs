//! One chat as seen by the client core.
//!
//! `ChatSession` ties the pieces together: it renders messages with a
//! per-message side table, drains the code queue after save-mode renders,
//! dispatches button and run actions to the backend, and writes edits back
//! through the host.

use std::sync::Arc;

use dashmap::DashMap;
use lugha_lml::{import_html, parse, serialize, Node, NodeId};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ActionRequest, ExecRequest, ExecutionBackend};
use crate::code_queue::{failure_message, CodeQueue};
use crate::config::ClientConfig;
use crate::error::{ChatError, ChatResult};
use crate::host::ChatHost;
use crate::message::{user_prompt, Message, Sender};
use crate::render::{wrap_entry_point, RenderMode, Renderer};
use crate::state::{CodeKey, LoadingAxis, RenderState};
use crate::stream::{render_loop, MessageAssembler, StreamOutcome};
use crate::view::View;

/// Result of [`ChatSession::stream_reply`].
#[derive(Debug)]
pub struct StreamedReply {
    pub message: Message,
    pub outcome: ChatResult<StreamOutcome>,
    /// Last successfully rendered view of the reply.
    pub view: Option<View>,
}

pub struct ChatSession {
    chat_id: String,
    config: ClientConfig,
    backend: Arc<dyn ExecutionBackend>,
    host: Arc<dyn ChatHost>,
    /// Side tables keyed by message id.
    states: DashMap<String, RenderState>,
}

impl ChatSession {
    pub fn new(
        chat_id: impl Into<String>,
        config: ClientConfig,
        backend: Arc<dyn ExecutionBackend>,
        host: Arc<dyn ChatHost>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            config,
            backend,
            host,
            states: DashMap::new(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn chat_of<'m>(&'m self, message: &'m Message) -> &'m str {
        message.chat_id.as_deref().unwrap_or(&self.chat_id)
    }

    /// Display-mode pass over an already parsed tree, filling `queue` when
    /// given. The renderer never lives across an await.
    fn render_tree(
        &self,
        message_id: &str,
        ast: &Node,
        save: bool,
        queue: Option<&mut CodeQueue>,
    ) -> ChatResult<View> {
        let mut state = self.states.entry(message_id.to_string()).or_default();
        let mut renderer = Renderer::new(RenderMode::Display { save }, &mut state);
        if let Some(queue) = queue {
            renderer = renderer.with_queue(queue);
        }
        Ok(renderer.render(ast)?)
    }

    /// Renders a message for display.
    ///
    /// Returns `Ok(None)` when there is nothing to render. A parse error is
    /// returned as is, with nothing rendered. In save mode, runnable blocks
    /// are executed once rendering is done; if that stamped any attribute,
    /// the message is re-serialized, written back, and the chat refreshed.
    pub async fn render(&self, message: &Message, save: bool) -> ChatResult<Option<View>> {
        if !message.has_content() {
            return Ok(None);
        }

        let mut ast = parse(&message.message)?;
        let mut queue = CodeQueue::new();
        let view = self.render_tree(&message.id, &ast, save, save.then_some(&mut queue))?;

        if queue.is_empty() {
            return Ok(Some(view));
        }

        debug!(id = %message.id, blocks = queue.len(), "executing runnable blocks");
        let altered = queue
            .exec(
                &mut ast,
                self.chat_of(message),
                &message.id,
                self.backend.as_ref(),
                self.host.as_ref(),
            )
            .await?;

        if altered {
            let source = serialize(&ast)?;
            self.host.edit_message(&message.id, &source).await?;
            self.host.refresh_chat().await?;
            info!(id = %message.id, "message re-serialized after execution");
        }

        Ok(Some(view))
    }

    /// Like [`render`](Self::render), but a parse error becomes a fallback
    /// view carrying the error text.
    pub async fn render_or_fallback(
        &self,
        message: &Message,
        save: bool,
    ) -> ChatResult<Option<View>> {
        match self.render(message, save).await {
            Err(e) if e.is_parse() => {
                warn!(id = %message.id, error = %e, "message failed to parse");
                Ok(Some(View::Fallback {
                    error: e.to_string(),
                }))
            }
            other => other,
        }
    }

    /// Editable rendering. Uses a scratch side table, so display state for
    /// the message is left alone.
    pub fn render_editor(&self, message: &Message) -> ChatResult<Option<View>> {
        if !message.has_content() {
            return Ok(None);
        }
        let ast = parse(&message.message)?;
        let mut scratch = RenderState::new();
        Ok(Some(Renderer::new(RenderMode::Editor, &mut scratch).render(&ast)?))
    }

    /// Flips a code block's collapsed flag. `None` if the block is unknown.
    pub fn toggle_code(&self, message_id: &str, key: &CodeKey) -> Option<bool> {
        self.states.get_mut(message_id)?.toggle(key)
    }

    pub fn set_loading(
        &self,
        message_id: &str,
        key: &CodeKey,
        axis: LoadingAxis,
        busy: bool,
    ) -> ChatResult<()> {
        let updated = self
            .states
            .get_mut(message_id)
            .map(|mut state| state.set_loading(key, axis, busy))
            .unwrap_or(false);
        if updated {
            Ok(())
        } else {
            Err(ChatError::UnknownBlock(key.to_string()))
        }
    }

    /// Marks a block as being copied and returns its text. The caller clears
    /// the flag with [`set_loading`](Self::set_loading) once the clipboard
    /// write is done.
    pub fn copy_code(&self, message_id: &str, key: &CodeKey) -> ChatResult<String> {
        self.set_loading(message_id, key, LoadingAxis::Copy, true)?;
        Ok(key.code.clone())
    }

    /// Forgets the side table of a message, e.g. when it is deleted.
    pub fn forget(&self, message_id: &str) {
        self.states.remove(message_id);
    }

    /// Runs the action bound to button `node` in `message`.
    ///
    /// Returns `Ok(None)` for a button without `onclick`.
    pub async fn click_button(&self, message: &Message, node: NodeId) -> ChatResult<Option<Message>> {
        let ast = parse(&message.message)?;
        let onclick = match ast.find_node(node) {
            Some(Node::Button(button)) => button
                .attribute_map()
                .get("onclick")
                .map(|v| v.as_text()),
            _ => {
                return Err(ChatError::UnknownNode {
                    id: node,
                    expected: "button",
                })
            }
        };
        match onclick {
            Some(body) => self.run_action(&body).await.map(Some),
            None => Ok(None),
        }
    }

    /// Sends `onclick` wrapped as an entry point to the backend's action
    /// endpoint and posts the resulting tool message.
    pub async fn run_action(&self, onclick: &str) -> ChatResult<Message> {
        let request = ActionRequest {
            code: wrap_entry_point(onclick),
            context: self.config.exec_context.clone(),
        };
        debug!(context = %request.context, "dispatching button action");

        match self.backend.action(request).await {
            Ok(result) => {
                let tool = Message::new(Sender::Tool, result.message)
                    .with_id(result.id)
                    .in_chat(&self.chat_id);
                self.host.push_message(tool.clone()).await?;
                self.host.send_message(tool.clone()).await?;
                Ok(tool)
            }
            Err(ChatError::Execution(reason)) => {
                warn!(%reason, "button action failed");
                let report =
                    Message::new(Sender::Tool, failure_message(&reason)).in_chat(&self.chat_id);
                self.host.push_message(report.clone()).await?;
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    /// The run action of a rendered `lugha` block. The block shows as
    /// running for the duration of the call.
    pub async fn run_block(&self, message: &Message, key: &CodeKey) -> ChatResult<Message> {
        self.set_loading(&message.id, key, LoadingAxis::Run, true)?;

        let request = ExecRequest {
            chat_id: self.chat_of(message).to_string(),
            message_id: message.id.clone(),
            code: key.code.clone(),
        };
        let result = self.backend.exec(request).await;

        // The block may have been pruned by a render while the call ran.
        if self
            .set_loading(&message.id, key, LoadingAxis::Run, false)
            .is_err()
        {
            debug!(key = %key, "block gone before run finished");
        }

        let tool = match result {
            Ok(result) => Message::new(Sender::Tool, result.message).with_id(result.id),
            Err(ChatError::Execution(reason)) => {
                warn!(key = %key, %reason, "block run failed");
                Message::new(Sender::Tool, failure_message(&reason))
            }
            Err(e) => return Err(e),
        }
        .in_chat(self.chat_of(message));

        self.host.push_message(tool.clone()).await?;
        Ok(tool)
    }

    /// Saves editor HTML back as the message's LML source.
    ///
    /// The import is checked by parsing it before anything is written.
    pub async fn save_edit(&self, message_id: &str, html: &str) -> ChatResult<String> {
        let source = import_html(html)?;
        parse(&source)?;
        self.host.edit_message(message_id, &source).await?;
        self.host.refresh_chat().await?;
        info!(id = message_id, "edited message saved");
        Ok(source)
    }

    /// Replaces the text of code block `node` with `code`, as handed back by
    /// an external editor, and saves the message.
    pub async fn save_code_edit(
        &self,
        message: &Message,
        node: NodeId,
        code: &str,
    ) -> ChatResult<String> {
        let mut ast = parse(&message.message)?;
        if !matches!(ast.find_node(node), Some(Node::Code(_))) {
            return Err(ChatError::UnknownNode {
                id: node,
                expected: "code",
            });
        }
        if let Some(element) = ast.find_element_mut(node) {
            element.body = Some(Box::new(Node::block(vec![Node::string(code)])));
        }

        let source = serialize(&ast)?;
        self.host.edit_message(&message.id, &source).await?;
        self.host.refresh_chat().await?;
        Ok(source)
    }

    /// Posts raw user input as a new message. Blank input is ignored.
    pub async fn send_prompt(&self, text: &str) -> ChatResult<Option<Message>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let message = Message::new(Sender::User, user_prompt(text)).in_chat(&self.chat_id);
        self.host.send_message(message.clone()).await?;
        Ok(Some(message))
    }

    /// Streams an assistant reply into the chat.
    ///
    /// Snapshots are rendered as they arrive; incomplete markup that does not
    /// parse yet keeps the previous view. When the stream completes, the
    /// final text is written back and rendered once more in save mode. An
    /// aborted or failed stream keeps whatever text arrived.
    pub async fn stream_reply<S, B>(&self, stream: S, cancel: CancellationToken) -> StreamedReply
    where
        S: Stream<Item = ChatResult<B>> + Unpin,
        B: AsRef<[u8]>,
    {
        let reply = Message::streaming_reply(Some(self.chat_id.clone()));
        let id = reply.id.clone();
        if let Err(e) = self.host.push_message(reply.clone()).await {
            return StreamedReply {
                message: reply,
                outcome: Err(e),
                view: None,
            };
        }

        let (assembler, snapshots) = MessageAssembler::new(reply);
        let mut view = None;
        let ((message, outcome), renders) = tokio::join!(
            assembler.run(stream, cancel),
            render_loop(snapshots, |text| match self.preview(&id, text) {
                Ok(Some(v)) => view = Some(v),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "snapshot not renderable yet"),
            }),
        );
        debug!(%id, renders, "stream finished");

        let mut reply = StreamedReply {
            message,
            outcome,
            view,
        };

        if let Err(e) = self
            .host
            .edit_message(&reply.message.id, &reply.message.message)
            .await
        {
            reply.outcome = Err(e);
            return reply;
        }

        if matches!(reply.outcome, Ok(StreamOutcome::Completed)) {
            match self.render_or_fallback(&reply.message, true).await {
                Ok(Some(v)) => reply.view = Some(v),
                Ok(None) => {}
                Err(e) => reply.outcome = Err(e),
            }
        }
        reply
    }

    fn preview(&self, message_id: &str, text: &str) -> ChatResult<Option<View>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let ast = parse(text)?;
        self.render_tree(message_id, &ast, false, None).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExecResult;
    use crate::host::MemoryChat;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        actions: Mutex<Vec<ActionRequest>>,
        execs: Mutex<Vec<ExecRequest>>,
    }

    #[async_trait]
    impl ExecutionBackend for Recorder {
        async fn action(&self, request: ActionRequest) -> ChatResult<ExecResult> {
            self.actions.lock().unwrap().push(request);
            Ok(ExecResult {
                id: "a1".into(),
                message: "p { `clicked` }".into(),
                filename: None,
            })
        }

        async fn exec(&self, request: ExecRequest) -> ChatResult<ExecResult> {
            self.execs.lock().unwrap().push(request);
            Ok(ExecResult {
                id: "e1".into(),
                message: "p { `ran` }".into(),
                filename: Some("main.lg".into()),
            })
        }
    }

    fn session(backend: Arc<Recorder>, chat: Arc<MemoryChat>) -> ChatSession {
        ChatSession::new("chat", ClientConfig::default(), backend, chat)
    }

    #[tokio::test]
    async fn test_blank_message_renders_nothing() {
        let s = session(Arc::default(), Arc::default());
        let m = Message::new(Sender::Assistant, "  \n ");
        assert_eq!(s.render(&m, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_click_wraps_onclick() {
        let backend = Arc::new(Recorder::default());
        let chat = Arc::new(MemoryChat::new());
        let s = session(backend.clone(), chat.clone());
        let m = Message::new(Sender::Assistant, "p { button[onclick=doit()] `Go` }");

        let tool = s.click_button(&m, 1).await.unwrap().unwrap();
        assert_eq!(tool.message, "p { `clicked` }");

        let actions = backend.actions.lock().unwrap().clone();
        assert_eq!(
            actions,
            vec![ActionRequest {
                code: "fun main(): unit {\n doit()\n}".into(),
                context: "lugha".into(),
            }]
        );
        assert_eq!(chat.sent(), vec!["a1".to_string()]);
    }

    #[tokio::test]
    async fn test_click_on_non_button() {
        let s = session(Arc::default(), Arc::default());
        let m = Message::new(Sender::Assistant, "p { `x` }");
        let err = s.click_button(&m, 0).await.unwrap_err();
        assert!(matches!(err, ChatError::UnknownNode { id: 0, .. }));
    }

    #[tokio::test]
    async fn test_run_block_clears_running_flag() {
        let backend = Arc::new(Recorder::default());
        let s = session(backend.clone(), Arc::default());
        let m = Message::new(Sender::Assistant, "code[lang=`lugha`] { `print(2)` }");

        let view = s.render(&m, false).await.unwrap().unwrap();
        let key = view.code_blocks()[0].key.clone();
        s.run_block(&m, &key).await.unwrap();

        assert_eq!(backend.execs.lock().unwrap()[0].code, "print(2)");
        let view = s.render(&m, false).await.unwrap().unwrap();
        assert!(!view.code_blocks()[0].actions.running);
    }

    #[tokio::test]
    async fn test_toggle_and_unknown_block() {
        let s = session(Arc::default(), Arc::default());
        let m = Message::new(Sender::Assistant, "code[lang=`text`] { `x` }");
        let view = s.render(&m, false).await.unwrap().unwrap();
        let key = view.code_blocks()[0].key.clone();

        assert_eq!(s.toggle_code(&m.id, &key), Some(true));
        s.forget(&m.id);
        assert_eq!(s.toggle_code(&m.id, &key), None);
        assert!(matches!(
            s.copy_code(&m.id, &key),
            Err(ChatError::UnknownBlock(_))
        ));
    }

    #[tokio::test]
    async fn test_save_code_edit_rewrites_block() {
        let chat = Arc::new(MemoryChat::new());
        let m = Message::new(Sender::Assistant, "code[lang=`lugha`] { `old()` }").with_id("m1");
        chat.push_message(m.clone()).await.unwrap();
        let s = session(Arc::default(), chat.clone());

        let source = s.save_code_edit(&m, 0, "new()").await.unwrap();
        assert_eq!(source, "code[lang=`lugha`] { `new()` }");
        assert_eq!(chat.message("m1").unwrap().message, source);
        assert_eq!(chat.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_send_prompt_skips_blank_input() {
        let chat = Arc::new(MemoryChat::new());
        let s = session(Arc::default(), chat.clone());
        assert!(s.send_prompt("   ").await.unwrap().is_none());

        let sent = s.send_prompt("what is `x`?").await.unwrap().unwrap();
        assert_eq!(sent.message, "p { `what is \\`x\\`?` }");
        assert_eq!(chat.sent(), vec![sent.id]);
    }
}
