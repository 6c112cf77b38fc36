//! Verdant CLI - terminal front end for the chat engine.
//!
//! Stands in for the browser view: a line-driven loop where `:`-prefixed
//! commands manage conversations, models and parameters, and anything else
//! is a chat turn. Streamed deltas print as they arrive; Ctrl-C cancels the
//! in-flight turn.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use verdant_app::{ChatSession, NoticeLevel, Preset, SettingsStore};
use verdant_engine::{display_name, is_vision_model, model_kind, ChatClient, DEFAULT_SERVER_URL};
use verdant_storage::{verdant_config_dir, ConversationStorage, VerdantPaths, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "verdant", about = "Chat with a local OpenAI-compatible model server")]
struct Cli {
    /// Base URL of the completion server
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Override the data directory
    #[arg(long, env = "VERDANT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Model id to select on startup
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(root) => VerdantPaths::from_root(root),
        None => VerdantPaths::new()?,
    };
    let storage = ConversationStorage::with_paths(paths);
    storage.init().await?;

    let settings_path = verdant_config_dir()?.join(CONFIG_FILE);
    let settings = SettingsStore::load_with_hooks(settings_path, &[verdant_app::apply_theme]);

    let client = ChatClient::new(cli.server_url.clone());
    let mut session = ChatSession::new(client, storage, settings);
    session.init().await?;

    // Print notices to stderr as they arrive.
    let mut notices = session.notifier().subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Success => "ok",
                NoticeLevel::Error => "error",
            };
            eprintln!("[{tag}] {}", notice.message);
        }
    });

    if session.refresh_models().await.is_ok() {
        println!(
            "Connected to {} ({} models)",
            cli.server_url,
            session.models().len()
        );
    }
    if let Some(model) = cli.model {
        session.select_model(&model)?;
    }
    if let Some(model) = session.selected_model() {
        println!("Model: {}", display_name(model));
    }
    println!("Type a message, or :help for commands.");

    repl(&mut session).await
}

async fn repl(session: &mut ChatSession) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    prompt(session);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            ":quit" | ":q" => break,
            ":help" => help(),
            ":new" => {
                if session.new_conversation().await.is_ok() {
                    println!("Started a new conversation.");
                }
            }
            ":list" => list_conversations(session),
            ":delete" => {
                if let Some(id) = session.active().map(|c| c.id.clone()) {
                    session.delete_conversation(&id).await?;
                    println!("Deleted. Now on: {}", active_title(session));
                }
            }
            ":models" => list_models(session),
            ":params" => print_params(session),
            ":stream" => {
                let on = session.toggle_streaming()?;
                println!("Streaming {}", if on { "enabled" } else { "disabled" });
            }
            _ => {
                if let Some(rest) = line.strip_prefix(":open ") {
                    open_conversation(session, rest);
                } else if let Some(title) = line.strip_prefix(":rename ") {
                    session.rename_active(title).await?;
                } else if let Some(query) = line.strip_prefix(":search ") {
                    search(session, query).await?;
                } else if let Some(id) = line.strip_prefix(":model ") {
                    select_model(session, id)?;
                } else if let Some(name) = line.strip_prefix(":preset ") {
                    match Preset::parse(name) {
                        Some(preset) => {
                            session.apply_preset(preset)?;
                            println!("Applied preset: {}", preset.name());
                        }
                        None => println!("Unknown preset: {name}"),
                    }
                } else if line == ":export" || line == ":export json" {
                    export(session, false).await;
                } else if line == ":export html" {
                    export(session, true).await;
                } else if let Some(prompt_text) = line.strip_prefix(":system ") {
                    session.set_system_prompt(prompt_text)?;
                    println!("System prompt set.");
                } else if line.starts_with(':') {
                    println!("Unknown command: {line}");
                } else {
                    run_turn(session, line).await;
                }
            }
        }
        prompt(session);
    }
    Ok(())
}

/// Run one chat turn, printing deltas as they stream in.
async fn run_turn(session: &mut ChatSession, text: &str) {
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut live = session.subscribe_live();
    let printer = tokio::spawn(async move {
        let mut printed = 0usize;
        while live.changed().await.is_ok() {
            let current = live.borrow_and_update().clone();
            if current.len() < printed {
                printed = 0;
            }
            if current.len() > printed {
                print!("{}", &current[printed..]);
                let _ = std::io::stdout().flush();
                printed = current.len();
            }
        }
    });

    let streaming = session.settings().streaming;
    let result = session.submit_with_cancel(text, None, cancel).await;
    ctrl_c.abort();
    printer.abort();

    if result.is_ok() {
        if let Some(message) = session.active().and_then(|c| c.messages.last()) {
            if !streaming {
                println!("{}", message.text().unwrap_or_default());
            } else {
                println!();
            }
            if let Some(metrics) = &message.metrics {
                println!(
                    "{:.2} tok/sec | {} tokens | {:.2}s to first token | {}",
                    metrics.tokens_per_second,
                    metrics.total_tokens,
                    metrics.time_to_first_token,
                    metrics.stop_reason
                );
            }
        }
    }
}

fn prompt(session: &ChatSession) {
    print!("{}> ", active_title(session));
    let _ = std::io::stdout().flush();
}

fn active_title(session: &ChatSession) -> String {
    session
        .active()
        .map(|c| c.title.clone())
        .unwrap_or_default()
}

fn list_conversations(session: &ChatSession) {
    let active_id = session.active().map(|c| c.id.clone());
    for (i, conversation) in session.conversations().iter().enumerate() {
        let marker = if Some(&conversation.id) == active_id.as_ref() {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {i}: {} ({} messages)",
            conversation.title,
            conversation.messages.len()
        );
    }
}

fn open_conversation(session: &mut ChatSession, index: &str) {
    let Ok(index) = index.trim().parse::<usize>() else {
        println!("Usage: :open <number>");
        return;
    };
    match session.conversations().get(index).map(|c| c.id.clone()) {
        Some(id) => {
            session.select_conversation(&id);
        }
        None => println!("No conversation #{index}"),
    }
}

fn list_models(session: &ChatSession) {
    if !session.is_connected() {
        println!("Not connected. Is the server running?");
        return;
    }
    for model in session.models() {
        let selected = if Some(model.id.as_str()) == session.selected_model() {
            "*"
        } else {
            " "
        };
        println!(
            "{selected} {} [{}] ({})",
            display_name(&model.id),
            model_kind(&model.id).label(),
            model.id
        );
    }
}

fn select_model(session: &mut ChatSession, id: &str) -> Result<()> {
    let id = id.trim();
    session.select_model(id)?;
    if is_vision_model(id) {
        println!("Selected {} (vision capable)", display_name(id));
    } else {
        println!("Selected {}", display_name(id));
    }
    Ok(())
}

async fn search(session: &ChatSession, query: &str) -> Result<()> {
    let hits = session.search(query).await?;
    if hits.is_empty() {
        println!("No matches.");
    }
    for conversation in hits {
        println!("{} ({} messages)", conversation.title, conversation.messages.len());
    }
    Ok(())
}

async fn export(session: &ChatSession, html: bool) {
    match session.export_active(html).await {
        Ok(path) => println!("Exported to {}", path.display()),
        Err(e) => eprintln!("[error] {e}"),
    }
}

fn print_params(session: &ChatSession) {
    let settings = session.settings();
    let p = &settings.parameters;
    println!("temperature: {}", p.temperature);
    println!("max_tokens: {}", p.max_tokens);
    println!("top_p: {}", p.top_p);
    println!("top_k: {}", p.top_k);
    println!("repeat_penalty: {}", p.repeat_penalty);
    println!(
        "system_prompt: {}",
        if p.system_prompt.is_empty() {
            "(none)"
        } else {
            &p.system_prompt
        }
    );
    println!("streaming: {}", settings.streaming);
    println!("theme: {}", settings.theme.as_str());
}

fn help() {
    println!(":new                start a new conversation");
    println!(":list               list conversations");
    println!(":open <n>           switch to conversation #n");
    println!(":delete             delete the current conversation");
    println!(":rename <title>     set the current conversation's title");
    println!(":search <text>      search titles and message text");
    println!(":models             list server models");
    println!(":model <id>         select a model");
    println!(":preset <name>      apply creative/balanced/precise/coding");
    println!(":system <prompt>    set the system prompt");
    println!(":params             show sampling parameters");
    println!(":stream             toggle streaming");
    println!(":export [html]      export the current conversation");
    println!(":quit               exit");
}
