//! Terminal front-end for one chat widget.
//!
//! Plain lines are sent as messages. Commands:
//! `/attach <path>`, `/action <token>`, `/resend`, `/ticket <title> | <description>`,
//! `/escalate [department]`, `/retry`, `/open`, `/close`, `/min`, `/help`, `/quit`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::message::Message;
use crate::chat::presentation::{NoticeLevel, Phase};
use crate::chat::transport::{OutboundAttachment, TicketDraft};
use crate::chat::widget::{ChatWidget, SendOutcome};

const HELP: &str = "\
commands:
  <text>                 send a message
  /attach <path>         send a file
  /action <token>        press a quick action (e.g. /action Check Status)
  /resend                send the kept draft and files again
  /ticket <title> | <description>
                         open a ticket from this chat
  /escalate [department] ask for a technician
  /retry                 reconnect after a failed session
  /open /close /min      window controls
  /quit                  leave
";

/// One parsed input line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Send text.
    Say(String),
    /// Send a file.
    Attach(PathBuf),
    /// Press a quick action.
    Action(String),
    /// Send the kept draft and files again.
    Resend,
    /// Open a ticket.
    Ticket {
        /// Ticket title.
        title: String,
        /// Ticket description.
        description: String,
    },
    /// Escalate, optionally to a department.
    Escalate(Option<String>),
    /// Retry session creation.
    Retry,
    /// Open the window.
    Open,
    /// Close the window.
    Close,
    /// Toggle minimized.
    Minimize,
    /// Show usage.
    Help,
    /// Leave.
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
/// Returns a usage message for unknown commands or missing arguments.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));
    let parsed = match (name, arg) {
        ("attach", "") => return Err("usage: /attach <path>".to_string()),
        ("attach", path) => Command::Attach(PathBuf::from(path)),
        ("action", "") => return Err("usage: /action <token>".to_string()),
        ("action", token) => Command::Action(token.to_string()),
        ("escalate", "") => Command::Escalate(None),
        ("escalate", department) => Command::Escalate(Some(department.to_string())),
        ("resend", _) => Command::Resend,
        ("ticket", fields) => parse_ticket(fields)?,
        ("retry", _) => Command::Retry,
        ("open", _) => Command::Open,
        ("close", _) => Command::Close,
        ("min", _) => Command::Minimize,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        (other, _) => return Err(format!("unknown command /{other}, try /help")),
    };
    Ok(Some(parsed))
}

fn parse_ticket(fields: &str) -> Result<Command, String> {
    match fields.split_once('|') {
        Some((title, description)) if !title.trim().is_empty() && !description.trim().is_empty() => {
            Ok(Command::Ticket {
                title: title.trim().to_string(),
                description: description.trim().to_string(),
            })
        }
        _ => Err("usage: /ticket <title> | <description>".to_string()),
    }
}

/// Tracks what has already been printed.
#[derive(Debug, Default)]
struct ConsoleView {
    printed: usize,
    actions: Vec<String>,
}

impl ConsoleView {
    async fn refresh<W>(&mut self, widget: &ChatWidget, output: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let state = widget.snapshot().await;
        let mut frame = String::new();

        if state.transcript.len() < self.printed {
            self.printed = 0;
        }
        for message in &state.transcript[self.printed..] {
            render_message(widget, message, &mut frame)?;
        }
        self.printed = state.transcript.len();

        for notice in widget.take_notices().await {
            let marker = match notice.level {
                NoticeLevel::Info => '*',
                NoticeLevel::Error => '!',
            };
            writeln!(frame, "{marker} {}", notice.text)?;
        }

        let actions = state.visible_quick_actions();
        if actions != self.actions.as_slice() {
            if !actions.is_empty() {
                let buttons: Vec<String> = actions.iter().map(|a| format!("[{a}]")).collect();
                writeln!(frame, "  actions: {}", buttons.join(" "))?;
            }
            self.actions = actions.to_vec();
        }

        if state.can_retry_session() {
            writeln!(frame, "  (not connected, /retry to try again)")?;
        } else if state.error.is_some() && !state.pending_attachments.is_empty() {
            writeln!(
                frame,
                "  (draft and {} file(s) kept, /resend to try again)",
                state.pending_attachments.len()
            )?;
        } else if state.error.is_some() && !state.compose.is_empty() {
            writeln!(frame, "  (draft kept, /resend to try again)")?;
        }

        emit(output, &frame).await
    }
}

fn render_message(widget: &ChatWidget, message: &Message, frame: &mut String) -> std::fmt::Result {
    writeln!(frame, "[{}] {}", message.sender, message.content)?;
    for attachment in &message.attachments {
        writeln!(
            frame,
            "  attachment: {} ({})",
            attachment.filename,
            widget.attachment_url(attachment)
        )?;
    }
    if let Some(link) = widget.ticket_link(message) {
        writeln!(frame, "  ticket: {link}")?;
    }
    Ok(())
}

async fn emit<W>(output: &mut W, text: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if text.is_empty() {
        return Ok(());
    }
    output
        .write_all(text.as_bytes())
        .await
        .context("writing to the terminal")?;
    output.flush().await.context("flushing the terminal")?;
    Ok(())
}

/// Run one command. Returns `false` when the session should end.
async fn execute<W>(widget: &ChatWidget, command: Command, output: &mut W) -> anyhow::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let outcome = match command {
        Command::Say(text) => {
            widget.set_compose(text).await;
            emit(output, "  ...\n").await?;
            widget.send(None, Vec::new()).await
        }
        Command::Resend => widget.send(None, Vec::new()).await,
        Command::Attach(path) => {
            let Some(attachment) = load_attachment(&path, output).await? else {
                return Ok(true);
            };
            emit(output, "  uploading...\n").await?;
            widget.send(Some(""), vec![attachment]).await
        }
        Command::Action(token) => widget.dispatch(&token).await,
        Command::Quit => return Ok(false),
        other => {
            window_command(widget, other, output).await?;
            return Ok(true);
        }
    };

    match outcome {
        SendOutcome::NoOp => emit(output, "  (nothing to send)\n").await?,
        SendOutcome::Busy => emit(output, "  (still sending the previous message)\n").await?,
        SendOutcome::Delivered { degraded: true } => {
            debug!("reply was missing, fallback acknowledgment shown");
        }
        SendOutcome::Delivered { degraded: false } | SendOutcome::Failed(_) => {}
    }
    Ok(true)
}

async fn load_attachment<W>(path: &Path, output: &mut W) -> anyhow::Result<Option<OutboundAttachment>>
where
    W: AsyncWrite + Unpin,
{
    match OutboundAttachment::from_path(path).await {
        Ok(attachment) => Ok(Some(attachment)),
        Err(err) => {
            emit(output, &format!("! cannot attach {}: {err}\n", path.display())).await?;
            Ok(None)
        }
    }
}

/// Commands that do not send a message.
async fn window_command<W>(widget: &ChatWidget, command: Command, output: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match command {
        Command::Escalate(department) => {
            log_failure(widget.escalate(department.as_deref()).await, "escalation not accepted");
        }
        Command::Ticket { title, description } => {
            let draft = TicketDraft::new(title, description);
            log_failure(widget.create_ticket(draft).await, "ticket not created");
        }
        Command::Retry => log_failure(widget.retry_session().await, "session retry failed"),
        Command::Open => log_failure(widget.open().await, "session unavailable on open"),
        Command::Close => {
            widget.close().await;
            emit(output, "[chat closed, /open to reopen]\n").await?;
        }
        Command::Minimize => {
            widget.toggle_minimized().await;
            let label = if widget.snapshot().await.is_minimized() {
                "[chat minimized]\n"
            } else {
                "[chat restored]\n"
            };
            emit(output, label).await?;
        }
        Command::Help => emit(output, HELP).await?,
        Command::Say(_) | Command::Resend | Command::Attach(_) | Command::Action(_) | Command::Quit => {}
    }
    Ok(())
}

/// Chat failures already reach the view as notices.
fn log_failure<T>(result: ChatResult<T>, context: &'static str) {
    if let Err(err) = result {
        debug!(error = %err, "{context}");
    }
}

/// Drive `widget` from `input` until end of input or `/quit`.
///
/// # Errors
/// Returns an error if reading input or writing output fails. Chat failures
/// are shown, never returned.
pub async fn repl<R, W>(widget: &ChatWidget, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut view = ConsoleView::default();
    emit(
        &mut output,
        &format!("helpdesk chat ({}), /help for commands\n", widget.config().api_base_url),
    )
    .await?;
    if let Err(err) = widget.open().await {
        debug!(error = %err, "session unavailable at start");
    }
    view.refresh(widget, &mut output).await?;

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await.context("reading input")? {
        let keep_going = match parse_command(&line) {
            Ok(Some(command)) => execute(widget, command, &mut output).await?,
            Ok(None) => true,
            Err(usage) => {
                emit(&mut output, &format!("{usage}\n")).await?;
                true
            }
        };
        if widget.phase().await != Phase::Closed {
            view.refresh(widget, &mut output).await?;
        }
        if !keep_going {
            break;
        }
    }
    Ok(())
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Run the console against the API configured in the environment.
///
/// # Returns
/// `ExitCode::SUCCESS` at end of input, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    tracing::info!("Starting helpdesk chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("API endpoint: {}", config.api_base_url);

    let widget = match ChatWidget::connect(config) {
        Ok(widget) => widget,
        Err(e) => {
            tracing::error!("Failed to create chat client: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(repl(&widget, tokio::io::stdin(), tokio::io::stdout())) {
        tracing::error!("Console error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
