//! # medi-agent
//!
//! `mediassist` binary: wires settings, stores, transport and the session
//! controller together behind a small line-oriented CLI.

#![deny(unsafe_code)]

mod store_factory;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use medi_core::{AccountId, ConversationId, Identity, Role};
use medi_runtime::{
    IdentityHandle, SessionConfig, SessionController, SessionEvent, SessionState,
    TranscriptUpdate,
};
use medi_settings::MediSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// User agent recorded in the login history for CLI sessions.
const CLI_USER_AGENT: &str = concat!("mediassist-cli/", env!("CARGO_PKG_VERSION"));

/// MediAssist chat client.
#[derive(Parser, Debug)]
#[command(name = "mediassist", about = "MediAssist streaming chat client")]
struct Cli {
    /// Signed-in account ID. Omit to chat anonymously.
    #[arg(long, global = true)]
    account: Option<String>,

    /// Contact email of the signed-in account.
    #[arg(long, global = true, requires = "account")]
    email: Option<String>,

    /// Contact phone of the signed-in account.
    #[arg(long, global = true, requires = "account")]
    phone: Option<String>,

    /// Settings file (defaults to `~/.mediassist/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat over stdin/stdout, one message per line.
    Chat,
    /// Saved conversations.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Recent sign-ins for the account.
    Logins,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List conversations, most recent first.
    List,
    /// Delete a conversation.
    Delete {
        /// Conversation ID from `history list`.
        id: String,
    },
}

impl Cli {
    fn identity(&self) -> Identity {
        match &self.account {
            Some(account) => Identity::Authenticated {
                account_id: AccountId::from(account.as_str()),
                email: self.email.clone(),
                phone: self.phone.clone(),
            },
            None => Identity::Anonymous,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(medi_settings::settings_path);
    let loaded = medi_settings::load_settings_from_path(&settings_path);
    let initialized = medi_settings::init_settings(match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => MediSettings::default(),
    });
    let settings = medi_settings::get_settings();
    medi_core::logging::init_subscriber(&settings.logging.level);
    if let Err(e) = loaded {
        tracing::warn!(path = %settings_path.display(), error = %e, "invalid settings, using defaults");
    }
    if initialized.is_err() {
        tracing::warn!("settings already initialized");
    }

    let config = SessionConfig::from_settings(settings);
    let router = store_factory::router(settings, config.history)?;
    let identity = args.identity();

    match &args.command {
        Command::Chat => {
            let transport = store_factory::transport(settings)?;
            if let Some(account) = identity.account_id() {
                if let Err(e) = medi_store::record_login(
                    router.structured().as_ref(),
                    account,
                    None,
                    Some(CLI_USER_AGENT),
                )
                .await
                {
                    tracing::warn!(error = %e, "failed to record login");
                }
            }
            let controller = SessionController::new(
                Arc::new(transport),
                router,
                IdentityHandle::new(identity),
                config,
            );
            chat(controller).await
        }
        Command::History { action } => {
            match action {
                HistoryAction::List => {
                    let summaries = router
                        .list_conversations(&identity)
                        .await
                        .context("Failed to load history")?;
                    if summaries.is_empty() {
                        println!("No conversations yet.");
                    }
                    for summary in summaries {
                        println!(
                            "{}  {}  {} ({} messages)",
                            summary.id,
                            summary.updated_at.format("%Y-%m-%d %H:%M"),
                            summary.title.as_deref().unwrap_or("Untitled"),
                            summary.message_count,
                        );
                        if let Some(preview) = summary.preview {
                            println!("    {preview}");
                        }
                    }
                }
                HistoryAction::Delete { id } => {
                    let removed = router
                        .delete_conversation(&identity, &ConversationId::from(id.as_str()))
                        .await
                        .context("Failed to delete conversation")?;
                    if !removed {
                        bail!("No conversation {id} for {}", identity.label());
                    }
                    println!("Deleted {id}");
                }
            }
            Ok(())
        }
        Command::Logins => {
            let Some(account) = identity.account_id() else {
                bail!("Login history requires --account");
            };
            let logins = medi_store::recent_logins(
                router.structured().as_ref(),
                account,
                settings.history.login_history_limit,
            )
            .await
            .context("Failed to load login history")?;
            for login in logins {
                println!(
                    "{}  {:<13}  {}",
                    login.login_at.with_timezone(&chrono::Local).format("%b %-d, %Y %-I:%M %p"),
                    login.device().label(),
                    login.ip_address.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
    }
}

async fn chat(controller: SessionController) -> Result<()> {
    let controller = Arc::new(controller);
    let printer = tokio::spawn(print_events(controller.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match controller.submit(&line).await {
            Ok(_) | Err(medi_runtime::SessionError::EmptyInput) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    drop(controller);
    let _ = printer.await;
    Ok(())
}

/// Streams assistant text to stdout and notices to stderr.
async fn print_events(mut rx: broadcast::Receiver<SessionEvent>) {
    let mut printed = 0usize;
    let mut stdout = std::io::stdout();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "output lagged behind the stream");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            SessionEvent::Transcript {
                update: TranscriptUpdate::MessageAppended { message, .. },
            } => {
                if message.role == Role::Assistant {
                    let _ = write!(stdout, "{}", message.content);
                    printed = message.content.len();
                } else {
                    printed = 0;
                }
            }
            SessionEvent::Transcript {
                update: TranscriptUpdate::LastMessageUpdated { content, .. },
            } => {
                if let Some(delta) = content.get(printed..) {
                    let _ = write!(stdout, "{delta}");
                }
                printed = content.len();
            }
            SessionEvent::StateChanged {
                state: SessionState::Idle,
            } => {
                let _ = writeln!(stdout);
            }
            SessionEvent::Notice { notice } => eprintln!("{notice}"),
            _ => {}
        }
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_without_account() {
        let cli = Cli::parse_from(["mediassist", "history", "list"]);
        assert!(cli.identity().is_anonymous());
    }

    #[test]
    fn account_flags_build_identity() {
        let cli = Cli::parse_from([
            "mediassist",
            "--account",
            "acct-1",
            "--email",
            "a@example.com",
            "logins",
        ]);
        assert_eq!(
            cli.identity(),
            Identity::Authenticated {
                account_id: "acct-1".into(),
                email: Some("a@example.com".into()),
                phone: None,
            }
        );
    }

    #[test]
    fn email_requires_account() {
        assert!(Cli::try_parse_from(["mediassist", "--email", "a@example.com", "chat"]).is_err());
    }

    #[test]
    fn delete_takes_id() {
        let cli = Cli::parse_from(["mediassist", "history", "delete", "1700000000000"]);
        match cli.command {
            Command::History {
                action: HistoryAction::Delete { id },
            } => assert_eq!(id, "1700000000000"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
