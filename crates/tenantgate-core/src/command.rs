//! Command dispatcher: the `action=` verb set applied to a resolved session.
//!
//! Verbs: `start`, `stop`, `restart`, `status`, and the four toggle names
//! (`groups`, `broadcasts`, `readreceipts`, `calls`). Stateless: every call
//! takes the session it acts on.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tenantgate_types::error::CommandError;
use tenantgate_types::session::SessionState;
use tenantgate_types::toggle::ToggleName;
use tracing::info;

use crate::session::{Session, StartOutcome, StopOutcome};

/// Reason recorded when a session is stopped through the command surface.
pub const STOP_REASON_COMMAND: &str = "command";

/// One parsed command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Restart,
    Status,
    Toggle(ToggleName),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Stop => write!(f, "stop"),
            Command::Restart => write!(f, "restart"),
            Command::Status => write!(f, "status"),
            Command::Toggle(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = s.trim().to_lowercase();
        match action.as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "restart" => Ok(Command::Restart),
            "status" => Ok(Command::Status),
            other => other
                .parse::<ToggleName>()
                .map(Command::Toggle)
                .map_err(|_| CommandError::InvalidAction(s.trim().to_string())),
        }
    }
}

/// Structured success reply for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    pub action: String,
    /// Human-readable summary, e.g. `started` or `groups toggled: false`.
    pub message: String,
    /// Session state after the command.
    pub state: SessionState,
    /// New toggle value, for toggle verbs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

/// Stateless executor for [`Command`]s.
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Parse `action` and run it against `session`.
    pub async fn run(session: &Session, action: &str) -> Result<CommandResponse, CommandError> {
        let command: Command = action.parse()?;
        Self::execute(session, command).await
    }

    /// Run `command` against `session`.
    ///
    /// Lifecycle no-ops (start while connected, stop while stopped) succeed
    /// and report the current state. Transport failures surface as
    /// `CommandError::Session` with the session left `Failed`.
    pub async fn execute(session: &Session, command: Command) -> Result<CommandResponse, CommandError> {
        let (message, value) = match command {
            Command::Start => match session.start().await? {
                StartOutcome::Connected => ("started".to_string(), None),
                StartOutcome::AlreadyActive(state) => (format!("already {state}"), None),
            },
            Command::Stop => match session.stop(STOP_REASON_COMMAND).await {
                StopOutcome::Stopped => ("stopped".to_string(), None),
                StopOutcome::AlreadyStopped => ("already stopped".to_string(), None),
            },
            Command::Restart => {
                session.restart().await?;
                ("restarted".to_string(), None)
            }
            Command::Status => (session.status().to_string(), None),
            Command::Toggle(name) => {
                let value = session.toggles().toggle(name);
                info!(token = %session.fingerprint(), toggle = %name, value, "toggle flipped");
                (format!("{name} toggled: {value}"), Some(value))
            }
        };

        Ok(CommandResponse {
            action: command.to_string(),
            message,
            state: session.state(),
            value,
        })
    }
}
