//! # Lugha chat core
//!
//! Client-side logic of the Lugha chat: turning assistant messages written
//! in LML into renderable views, executing runnable code blocks through a
//! remote backend, assembling streamed replies, and saving edits back.
//!
//! The UI layer owns presentation. It gets a [`View`] tree (or its HTML) and
//! reports user actions back to a [`ChatSession`].

pub mod backend;
pub mod code_queue;
pub mod config;
pub mod error;
pub mod host;
pub mod message;
pub mod render;
pub mod session;
pub mod state;
pub mod stream;
pub mod view;

pub use backend::{ActionRequest, ExecRequest, ExecResult, ExecutionBackend, HttpBackend};
pub use code_queue::{stamp_filename, CodeEntry, CodeQueue};
pub use config::ClientConfig;
pub use error::{ChatError, ChatResult};
pub use host::{ChatHost, MemoryChat};
pub use message::{user_prompt, Message, Sender};
pub use render::{wrap_entry_point, RenderArgs, RenderMode, Renderer, RUNNABLE_LANG};
pub use session::{ChatSession, StreamedReply};
pub use state::{CodeKey, CodeUiState, LoadingAxis, RenderState};
pub use stream::{render_loop, MessageAssembler, StreamOutcome, Utf8ChunkDecoder};
pub use view::{CodeActions, CodeBlockView, PanelKind, View};
