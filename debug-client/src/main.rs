mod commands;
mod output;
mod render;
mod state;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::ArgAction;
use clap::Parser;
use codex_monitor_client::AccessMode;
use codex_monitor_client::AppServerBackend;
use codex_monitor_client::DebugSink;
use codex_monitor_client::MonitorClient;
use codex_monitor_client::MonitorConfig;
use codex_monitor_client::SendOutcome;
use codex_monitor_client::TracingDebugSink;
use codex_monitor_client::WorkspaceInfo;
use codex_monitor_protocol::ReasoningEffort;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::commands::InputAction;
use crate::commands::UserCommand;
use crate::commands::parse_input;
use crate::output::LabelColor;
use crate::output::Output;
use crate::render::LineKind;
use crate::state::TranscriptCursor;
use crate::transport::StdioAppServer;

#[derive(Parser)]
#[command(version, about = "Interactive shell over the codex-monitor thread engine")]
struct Cli {
    /// Path to the `codex` CLI binary.
    #[arg(long, default_value = "codex")]
    codex_bin: String,

    /// Forwarded to the `codex` CLI as `--config key=value`. Repeatable.
    #[arg(short = 'c', long = "config", value_name = "key=value", action = ArgAction::Append)]
    config_overrides: Vec<String>,

    /// Workspace directory. Defaults to the current directory.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Resume an existing thread instead of waiting for the first message.
    #[arg(long)]
    thread_id: Option<String>,

    /// Model override for new turns.
    #[arg(long)]
    model: Option<String>,

    /// Reasoning effort for new turns.
    #[arg(long, value_parser = parse_effort)]
    effort: Option<ReasoningEffort>,

    /// Sandbox access for new turns: read-only, current, or full-access.
    #[arg(long, value_parser = parse_access_mode)]
    access_mode: Option<AccessMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Users control the log level with `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let output = Output::new();

    let (mut config, home) = MonitorConfig::load().context("load monitor config")?;
    if cli.model.is_some() {
        config.model = cli.model.clone();
    }
    if cli.effort.is_some() {
        config.effort = cli.effort;
    }
    if let Some(access_mode) = cli.access_mode {
        config.access_mode = access_mode;
    }

    let workspace_path = match cli.workspace.clone() {
        Some(path) => path,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let workspace_id = workspace_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());

    let (server, mut events) = StdioAppServer::spawn(
        &cli.codex_bin,
        &cli.config_overrides,
        &workspace_id,
        &workspace_path,
    )
    .with_context(|| format!("failed to start `{}` app-server", cli.codex_bin))?;
    server.initialize().await.context("initialize app-server")?;

    let backend: Arc<dyn AppServerBackend> = Arc::new(server);
    let debug_sink: Arc<dyn DebugSink> = Arc::new(TracingDebugSink);
    let client = Arc::new(MonitorClient::from_config(
        backend,
        config,
        &home,
        Some(debug_sink),
    ));
    client.connect_workspace(WorkspaceInfo::new(workspace_id.clone(), workspace_path));
    output.set_prompt(&workspace_id);

    if let Some(thread_id) = cli.thread_id.as_deref() {
        client.set_active_thread(&workspace_id, Some(thread_id));
        if !client.resume_thread(&workspace_id, thread_id, true).await {
            output
                .client_line(&format!("failed to resume thread {thread_id}"))
                .ok();
        }
    }

    {
        let client = Arc::clone(&client);
        let workspace_id = workspace_id.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                client.handle_event(&event);
                if !client.queue().ready_threads().is_empty() {
                    let client = Arc::clone(&client);
                    let workspace_id = workspace_id.clone();
                    tokio::spawn(async move {
                        client.flush_queued_messages(&workspace_id).await;
                    });
                }
            }
        });
    }

    {
        let mut updates = client.subscribe();
        let output = output.clone();
        let workspace_id = workspace_id.clone();
        tokio::spawn(async move {
            let mut cursor = TranscriptCursor::default();
            while updates.changed().await.is_ok() {
                let lines = {
                    let state = updates.borrow_and_update();
                    cursor.changes(&state, &workspace_id)
                };
                for line in lines {
                    let thread_label = output.format_label(&line.thread_id, LabelColor::Thread);
                    let text = output.format_label(&line.line.text, label_color(line.line.kind));
                    output.server_line(&format!("{thread_label} {text}")).ok();
                }
            }
        });
    }

    print_help(&output);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        output.prompt().ok();
        let Some(line) = lines.next_line().await.context("read stdin")? else {
            break;
        };
        match parse_input(&line) {
            Ok(None) => {}
            Ok(Some(InputAction::Message(text))) => {
                let outcome = client.send_user_message(&workspace_id, &text).await;
                report_send(&output, outcome);
            }
            Ok(Some(InputAction::Review(text))) => {
                let outcome = client.start_review(&workspace_id, &text).await;
                report_send(&output, outcome);
            }
            Ok(Some(InputAction::Command(command))) => {
                if !handle_command(command, &client, &workspace_id, &output).await {
                    break;
                }
            }
            Err(err) => {
                output.client_line(&err.message()).ok();
            }
        }
    }

    Ok(())
}

async fn handle_command(
    command: UserCommand,
    client: &MonitorClient,
    workspace_id: &str,
    output: &Output,
) -> bool {
    let active = client
        .store()
        .read(|state| state.active_thread(workspace_id).map(str::to_string));
    match command {
        UserCommand::Help => print_help(output),
        UserCommand::Quit => return false,
        UserCommand::NewThread => match client.start_thread(workspace_id).await {
            Some(thread_id) => {
                output
                    .client_line(&format!("active thread is now {thread_id}"))
                    .ok();
            }
            None => {
                output.client_line("failed to start thread").ok();
            }
        },
        UserCommand::Resume(thread_id) => {
            client.set_active_thread(workspace_id, Some(&thread_id));
            if client.resume_thread(workspace_id, &thread_id, true).await {
                output
                    .client_line(&format!("resumed thread {thread_id}"))
                    .ok();
            } else {
                output
                    .client_line(&format!("failed to resume thread {thread_id}"))
                    .ok();
            }
        }
        UserCommand::Use(thread_id) => {
            client.set_active_thread(workspace_id, Some(&thread_id));
            if !client.is_thread_loaded(&thread_id) {
                client.resume_thread(workspace_id, &thread_id, false).await;
            }
            output
                .client_line(&format!("switched active thread to {thread_id}"))
                .ok();
        }
        UserCommand::List => {
            let threads = client.list_threads_for_workspace(workspace_id).await;
            if threads.is_empty() {
                output.client_line("threads: (none)").ok();
            } else {
                output.client_line("threads:").ok();
                for thread in threads {
                    let marker = if active.as_deref() == Some(thread.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    output
                        .client_line(&format!("{marker} {}  {}", thread.id, thread.name))
                        .ok();
                }
            }
        }
        UserCommand::Archive(thread_id) => {
            let Some(thread_id) = thread_id.or(active) else {
                output.client_line("no active thread to archive").ok();
                return true;
            };
            if client.archive_thread(workspace_id, &thread_id).await {
                output
                    .client_line(&format!("archived thread {thread_id}"))
                    .ok();
            } else {
                output
                    .client_line(&format!("failed to archive thread {thread_id}"))
                    .ok();
            }
        }
        UserCommand::Interrupt => match active {
            Some(thread_id) => client.interrupt_turn(workspace_id, &thread_id).await,
            None => {
                output.client_line("no active thread").ok();
            }
        },
        UserCommand::Answer {
            request_id,
            decision,
        } => {
            if !client
                .respond_to_approval(workspace_id, &request_id, decision)
                .await
            {
                output
                    .client_line(&format!("could not answer request {request_id}"))
                    .ok();
            }
        }
        UserCommand::Limits => {
            if client.refresh_rate_limits(workspace_id).await {
                let snapshot = client.store().read(|state| {
                    state.rate_limits_by_workspace.get(workspace_id).cloned()
                });
                let windows = snapshot.iter().flat_map(|limits| {
                    [("primary", &limits.primary), ("secondary", &limits.secondary)]
                });
                for (label, window) in windows {
                    if let Some(window) = window {
                        output
                            .client_line(&format!("{label}: {:.0}% used", window.used_percent))
                            .ok();
                    }
                }
            } else {
                output.client_line("rate limits unavailable").ok();
            }
        }
    }
    true
}

fn report_send(output: &Output, outcome: SendOutcome) {
    let message = match outcome {
        SendOutcome::Queued => "thread busy; message queued",
        SendOutcome::Ignored => "nothing sent",
        SendOutcome::Failed => "send failed",
        SendOutcome::Sent { .. } => return,
    };
    output.client_line(message).ok();
}

fn label_color(kind: LineKind) -> LabelColor {
    match kind {
        LineKind::User => LabelColor::User,
        LineKind::Assistant => LabelColor::Assistant,
        LineKind::Tool => LabelColor::Tool,
        LineKind::Meta => LabelColor::ToolMeta,
        LineKind::Error => LabelColor::Error,
    }
}

fn parse_effort(value: &str) -> Result<ReasoningEffort> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .with_context(|| format!("unknown reasoning effort: {value}"))
}

fn parse_access_mode(value: &str) -> Result<AccessMode> {
    match value {
        "read-only" | "readOnly" => Ok(AccessMode::ReadOnly),
        "current" => Ok(AccessMode::Current),
        "full-access" | "fullAccess" => Ok(AccessMode::FullAccess),
        _ => anyhow::bail!(
            "unknown access mode: {value}. Expected one of: read-only, current, full-access"
        ),
    }
}

fn print_help(output: &Output) {
    let _ = output.client_line("commands:");
    let _ = output.client_line("  :help                       show this help");
    let _ = output.client_line("  :new                        start a new thread");
    let _ = output.client_line("  :resume <thread-id>         load a thread's history and make it active");
    let _ = output.client_line("  :use <thread-id>            switch the active thread");
    let _ = output.client_line("  :list                       list threads for this workspace");
    let _ = output.client_line("  :archive [thread-id]        archive a thread (default: active)");
    let _ = output.client_line("  :interrupt                  stop the running turn");
    let _ = output.client_line("  :approve <id> [session]     accept an approval request");
    let _ = output.client_line("  :decline <id> [cancel]      decline an approval request");
    let _ = output.client_line("  :limits                     show account rate limits");
    let _ = output.client_line("  :quit                       exit");
    let _ = output.client_line("/review [base <branch>|commit <sha> [title]|<instructions>] starts a review");
    let _ = output.client_line("type a message to send it to the active thread");
}
