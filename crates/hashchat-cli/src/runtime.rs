//! Async runtime
//!
//! Event loop that reads lines from stdin, drives the [`Client`], and bridges
//! to the relay WebSocket. Uses `tokio::select!` to handle user input and
//! relay payloads concurrently. Chat output goes to stdout; logs go to
//! stderr.

use std::{
    io::{self, Write},
    time::Duration,
};

use hashchat_client::{
    Client, ClientAction, ClientError, ClientEvent, Identity, OnlineUser, SessionConfig, SystemEnv,
    transport::{self, ConnectedClient, TransportError, TransportEvent},
};
use hashchat_crypto::{CryptoError, KdfParams, derive_key};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render;

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// I/O error on stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Key derivation task panicked or was cancelled.
    #[error("key derivation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Everything needed to join a room.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Relay WebSocket URL.
    pub server: String,
    /// Room passphrase.
    pub phrase: String,
    /// This client's identity.
    pub identity: Identity,
    /// Session behaviour.
    pub session: SessionConfig,
    /// Key derivation cost.
    pub kdf: KdfParams,
}

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the text as a chat message.
    Say(String),
    /// Show who is online.
    Who,
    /// Announce departure and exit.
    Quit,
    /// Show command help.
    Help,
    /// Nothing to do.
    Empty,
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/who" => Self::Who,
            "/help" => Self::Help,
            _ => Self::Say(trimmed.to_string()),
        }
    }
}

/// How long to wait for queued payloads to flush on exit.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const HELP: &str = "Commands: /who lists online users, /quit leaves the room. Anything else is sent.";

/// Interactive chat session.
pub struct Runtime {
    client: Client<SystemEnv>,
    connection: ConnectedClient,
    online: Vec<OnlineUser>,
    out: io::Stdout,
}

impl Runtime {
    /// Derive the room key and connect to the relay.
    pub async fn connect(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let RuntimeConfig { server, phrase, identity, session, kdf } = config;

        // Key derivation is CPU-bound
        let key = tokio::task::spawn_blocking(move || derive_key(&phrase, &kdf)).await??;
        tracing::debug!("room key derived");

        let connection = transport::connect(&server).await?;
        let client = Client::new(SystemEnv::new(), identity, key, session);

        Ok(Self { client, connection, online: Vec::new(), out: io::stdout() })
    }

    /// Run until the user quits or the relay goes away.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let should_quit = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => self.quit().await?,
                },

                event = self.connection.from_server.recv() => match event {
                    Some(TransportEvent::Opened) => {
                        self.feed(ClientEvent::Connected).await?;
                        false
                    },
                    Some(TransportEvent::Message(payload)) => {
                        self.feed(ClientEvent::PayloadReceived(payload)).await?;
                        false
                    },
                    Some(TransportEvent::Closed) | None => {
                        self.feed(ClientEvent::Disconnected).await?;
                        true
                    },
                },
            };

            if should_quit {
                break;
            }
        }

        self.connection.close(CLOSE_GRACE).await;
        Ok(())
    }

    /// Handle one line of input and return whether to quit.
    async fn handle_line(&mut self, line: &str) -> Result<bool, RuntimeError> {
        match Command::parse(line) {
            Command::Empty => Ok(false),
            Command::Quit => self.quit().await,
            Command::Help => {
                writeln!(self.out, "{HELP}")?;
                Ok(false)
            },
            Command::Who => {
                let identity = self.client.session().identity();
                writeln!(
                    self.out,
                    "{}",
                    render::online_line(&self.online, &identity.client_id, &identity.username)
                )?;
                Ok(false)
            },
            Command::Say(text) => {
                match self.client.handle(ClientEvent::SendMessage { text }) {
                    Ok(actions) => self.execute(actions).await?,
                    Err(ClientError::NotConnected) => {
                        writeln!(self.out, "! Not connected yet; message not sent")?;
                    },
                    Err(ClientError::EmptyMessage) => {},
                }
                Ok(false)
            },
        }
    }

    async fn quit(&mut self) -> Result<bool, RuntimeError> {
        self.feed(ClientEvent::Leave).await?;
        Ok(true)
    }

    async fn feed(&mut self, event: ClientEvent) -> Result<(), RuntimeError> {
        match self.client.handle(event) {
            Ok(actions) => self.execute(actions).await,
            Err(e) => {
                tracing::warn!(error = %e, "client rejected event");
                Ok(())
            },
        }
    }

    async fn execute(&mut self, actions: Vec<ClientAction>) -> Result<(), RuntimeError> {
        let own_name = self.client.session().identity().username.clone();
        for action in actions {
            match action {
                ClientAction::Send(payload) => {
                    if self.connection.to_server.send(payload).await.is_err() {
                        tracing::warn!("connection task gone; payload not sent");
                    }
                },
                ClientAction::Deliver(message) => {
                    writeln!(self.out, "{}", render::message_line(&message, &own_name))?;
                },
                ClientAction::Notice(notice) => {
                    writeln!(self.out, "{}", render::notice_line(&notice))?;
                },
                ClientAction::OnlineUsers(users) => self.online = users,
                ClientAction::HistoryLoaded(summary) => {
                    tracing::info!(
                        received = summary.received,
                        decrypted = summary.decrypted,
                        failed = summary.failed,
                        "history loaded"
                    );
                },
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
