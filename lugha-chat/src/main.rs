use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use lugha_chat::view::highlight_css;
use lugha_chat::{
    ChatError, ChatSession, ClientConfig, HttpBackend, MemoryChat, Message, Sender,
};
use tracing::{error, info};

const USAGE: &str = "\
Usage: lugha-render [--save] [--editor] [--css] <file.lml>
       lugha-render --import <file.html>

Options:
  --save     Execute runnable lugha blocks against LUGHA_BACKEND_URL
  --editor   Render the editable surface instead of the display one
  --css      Prepend the syntax highlighting stylesheet
  --import   Convert edited HTML back to LML";

struct Options {
    save: bool,
    editor: bool,
    css: bool,
    import: bool,
    file: String,
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options {
        save: false,
        editor: false,
        css: false,
        import: false,
        file: String::new(),
    };
    for arg in args {
        match arg.as_str() {
            "--save" => options.save = true,
            "--editor" => options.editor = true,
            "--css" => options.css = true,
            "--import" => options.import = true,
            flag if flag.starts_with("--") => return None,
            file if options.file.is_empty() => options.file = file.to_string(),
            _ => return None,
        }
    }
    if options.file.is_empty() {
        None
    } else {
        Some(options)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };

    if let Err(e) = run(options).await {
        error!(error = %e, "lugha-render failed");
        process::exit(1);
    }
}

async fn run(options: Options) -> Result<(), ChatError> {
    let content = fs::read_to_string(&options.file)
        .map_err(|e| ChatError::Config(format!("Failed to read {}: {}", options.file, e)))?;

    if options.import {
        println!("{}", lugha_lml::import_html(&content)?);
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    let backend = Arc::new(HttpBackend::new(&config)?);
    let message = Message::new(Sender::Assistant, content).in_chat("cli");
    let chat = Arc::new(MemoryChat::with_messages(vec![message.clone()]));
    let session = ChatSession::new("cli", config, backend, chat.clone());

    let view = if options.editor {
        session.render_editor(&message)?
    } else {
        session.render_or_fallback(&message, options.save).await?
    };

    if options.css {
        println!("<style>\n{}</style>", highlight_css());
    }
    match view {
        Some(view) => println!("{}", view.to_html()),
        None => info!(file = %options.file, "nothing to render"),
    }

    if let Some(updated) = chat.message(&message.id) {
        if updated.message != message.message {
            info!("source updated after execution");
            println!("{}", updated.message);
        }
    }
    for tool in chat.messages().iter().filter(|m| m.sender == Sender::Tool) {
        println!("{}", tool.message);
    }
    Ok(())
}
