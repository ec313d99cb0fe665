//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for issuing sessions and managing jar
//! permissions on behalf of an owner. Each line is one JSON command; each
//! response is one JSON line.

use crate::error::Result;
use crate::node::NodeState;
use crate::sessions::SessionTokens;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Issue a session for a user
    IssueSession { user_id: String },
    /// List all jars as `id name (owner)`
    ListJars,
    /// Grant edit permission as the jar owner
    Grant {
        jar_id: String,
        owner_id: String,
        user_id: String,
    },
    /// Revoke edit permission as the jar owner
    Revoke {
        jar_id: String,
        owner_id: String,
        user_id: String,
    },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Session { tokens: SessionTokens },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    state: Arc<NodeState>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(state: Arc<NodeState>, socket_path: &Path) -> Self {
        Self {
            state,
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<NodeState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &state).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

/// Run one admin command against the node state.
pub async fn execute_command(cmd: AdminCommand, state: &NodeState) -> AdminResponse {
    match cmd {
        AdminCommand::IssueSession { user_id } => match state.sessions.issue(&user_id) {
            Ok(tokens) => {
                tracing::info!(user_id = %user_id, "Issued session via admin socket");
                AdminResponse::Session { tokens }
            }
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::ListJars => match state.ledger.list_jars() {
            Ok(jars) => AdminResponse::List {
                items: jars
                    .into_iter()
                    .map(|jar| format!("{} {} ({})", jar.id, jar.name, jar.owner_id))
                    .collect(),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Grant {
            jar_id,
            owner_id,
            user_id,
        } => match state
            .coordinator
            .grant_permission(&jar_id, &owner_id, &user_id)
            .await
        {
            Ok(_) => AdminResponse::Ok {
                message: format!("Granted edit on {} to {}", jar_id, user_id),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Revoke {
            jar_id,
            owner_id,
            user_id,
        } => match state
            .coordinator
            .revoke_permission(&jar_id, &owner_id, &user_id)
            .await
        {
            Ok(_) => AdminResponse::Ok {
                message: format!("Revoked edit on {} from {}", jar_id, user_id),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

/// Default socket path, resolved the same way the node resolves it.
pub fn default_socket_path() -> PathBuf {
    socket_path_from(
        std::env::var("SWEARJAR_ADMIN_SOCKET").ok(),
        std::env::var("SWEARJAR_DATA_DIR").ok(),
    )
}

fn socket_path_from(admin_socket: Option<String>, data_dir: Option<String>) -> PathBuf {
    match admin_socket {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(data_dir.unwrap_or_else(|| "./swearjar-data".to_string()))
            .join("admin.sock"),
    }
}
