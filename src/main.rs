//! Terminal client for the assistant widget backend
//!
//! Drives the same conversation controller as the browser widget, with a
//! JSON file in the user data directory standing in for `localStorage`.
//!
//! Run with: WIDGET_API_URL=http://localhost:3401 WIDGET_KEY=... cargo run

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[cfg(not(target_arch = "wasm32"))]
use assistant_widget::{
    ControllerError, ConversationController, EndOutcome, KeyValueStore, Message, MessageRole,
    RevalidationOutcome, SendOutcome, WidgetConfig, WidgetPreferences,
    infrastructure::api::HttpConversationClient,
    infrastructure::storage::{FileBackend, MemoryBackend, share},
    shared::logging::init_tracing,
};

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[command(name = "assistant-widget")]
#[command(about = "Chat with the assistant widget backend from a terminal", long_about = None)]
struct Cli {
    /// Backend origin (overrides WIDGET_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Public widget key (overrides WIDGET_KEY)
    #[arg(long)]
    widget_key: Option<String>,

    /// Store file, defaults to <data dir>/assistant-widget/store.json
    #[arg(long, env = "WIDGET_STORE_PATH")]
    store: Option<PathBuf>,

    /// Keep the session and transcript in memory only
    #[arg(long, conflicts_with = "store")]
    ephemeral: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let mut config = WidgetConfig::from_env()?;
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = url;
    }
    if let Some(key) = cli.widget_key.clone() {
        config = config.with_widget_key(key);
    }

    let store = open_store(&cli, &config);
    let client = HttpConversationClient::new(&config)?;
    let controller = Arc::new(ConversationController::new(client, store.clone()));
    let preferences = WidgetPreferences::new(store);
    preferences.set_open(true);

    let server_config = controller.fetch_server_config().await;
    if let Some(greeting) = &server_config.greeting {
        println!("{}", greeting);
    }

    let hydration = controller.start().await?;
    tracing::info!(
        session_id = %hydration.session_id,
        source = ?hydration.source,
        messages = hydration.messages.len(),
        "Widget hydrated"
    );
    print_transcript(&hydration.messages);
    if hydration.transcript_ended {
        println!("-- previous conversation ended; your next message starts a new one --");
    }

    if hydration.needs_revalidation() {
        let background = Arc::clone(&controller);
        tokio::spawn(async move {
            if let RevalidationOutcome::Rotated(rotation) = background.revalidate().await {
                tracing::info!(
                    retired = %rotation.retired.id,
                    current = %rotation.current.id,
                    "Cached conversation had ended on the server"
                );
            }
        });
    }

    println!("Commands: /retry /end /clear /history /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt().await?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/retry" => report_send(controller.retry().await),
            "/history" => print_transcript(&controller.snapshot().await.messages),
            "/end" => match controller.end_conversation().await {
                Ok(EndOutcome::Ended { confirmed, .. }) => {
                    if !confirmed {
                        tracing::warn!("Backend did not confirm the end of the conversation");
                    }
                    println!("-- conversation ended; your next message starts a new one --");
                }
                Ok(EndOutcome::Dropped) => {}
                Err(e) => println!("!! {}", e.user_message()),
            },
            "/clear" => match controller.clear_history().await {
                Ok(_) => println!("-- history cleared --"),
                Err(e) => println!("!! {}", e.user_message()),
            },
            text => report_send(controller.send(text).await),
        }
        prompt().await?;
    }

    controller.shutdown();
    preferences.set_open(false);
    Ok(())
}

/// File store unless `--ephemeral`; a store that cannot be opened degrades
/// to a non-persistent one.
#[cfg(not(target_arch = "wasm32"))]
fn open_store(cli: &Cli, config: &WidgetConfig) -> KeyValueStore {
    let prefix = config.storage_prefix.clone();
    if cli.ephemeral {
        return KeyValueStore::new(share(MemoryBackend::new()), prefix);
    }

    let Some(path) = cli.store.clone().or_else(FileBackend::default_path) else {
        tracing::warn!("No data directory available - conversation will not persist");
        return KeyValueStore::disabled(prefix);
    };

    match FileBackend::open(&path) {
        Ok(backend) => KeyValueStore::new(share(backend), prefix),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open store - conversation will not persist");
            KeyValueStore::disabled(prefix)
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn prompt() -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"you> ").await?;
    stdout.flush().await
}

#[cfg(not(target_arch = "wasm32"))]
fn print_transcript(messages: &[Message]) {
    for message in messages {
        let speaker = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
        };
        println!("{}> {}", speaker, message.content);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn report_send(result: Result<SendOutcome, ControllerError>) {
    match result {
        Ok(SendOutcome::Delivered {
            reply,
            conversation_ended,
            ..
        }) => {
            println!("assistant> {}", reply.content);
            if conversation_ended {
                println!("-- conversation ended; your next message starts a new one --");
            }
        }
        Ok(SendOutcome::Dropped) => {}
        Err(e) if e.is_retryable() => println!("!! {} (type /retry to resend)", e.user_message()),
        Err(e) => println!("!! {}", e.user_message()),
    }
}

// The browser build is a library; see `bindings`
#[cfg(target_arch = "wasm32")]
fn main() {}
