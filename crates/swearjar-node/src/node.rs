//! Swear jar node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - One ledger store, one broadcaster, one coordinator, built at startup
//!   and shared by reference with every request handler
//! - HTTP API + WebSocket for clients
//! - Unix admin socket for local operator commands (swearjar-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::broadcast::{Broadcaster, DEFAULT_CAPACITY};
use crate::coordinator::MutationCoordinator;
use crate::error::{Error, Result};
use crate::ledger::LedgerStore;
use crate::sessions::SessionStore;
use crate::storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How often expired sessions are swept from storage.
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Configuration for a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for swearjar-admin CLI)
    pub admin_socket: PathBuf,

    /// How long a writer waits for a busy jar before giving up
    pub lock_timeout: Duration,

    /// Per-subscriber broadcast buffer
    pub broadcast_capacity: usize,

    /// WebSocket heartbeat period
    pub heartbeat_interval: Duration,

    /// Access session lifetime
    pub session_ttl: Duration,

    /// Refresh grant lifetime
    pub refresh_ttl: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./swearjar-data");
        Self {
            admin_socket: data_dir.join("admin.sock"),
            data_dir,
            api_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            lock_timeout: Duration::from_secs(2),
            broadcast_capacity: DEFAULT_CAPACITY,
            heartbeat_interval: Duration::from_secs(30),
            session_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

impl NodeConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = std::env::var("SWEARJAR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let admin_socket = std::env::var("SWEARJAR_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("admin.sock"));

        let api_addr = env_parse("SWEARJAR_API_ADDR")?.unwrap_or(defaults.api_addr);

        let lock_timeout = env_parse::<u64>("SWEARJAR_LOCK_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        let broadcast_capacity =
            env_parse("SWEARJAR_BROADCAST_CAPACITY")?.unwrap_or(defaults.broadcast_capacity);
        if broadcast_capacity == 0 {
            return Err(Error::Config("SWEARJAR_BROADCAST_CAPACITY must be positive".into()));
        }

        let heartbeat_interval = env_parse::<u64>("SWEARJAR_HEARTBEAT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);
        if heartbeat_interval.is_zero() {
            return Err(Error::Config("SWEARJAR_HEARTBEAT_SECS must be positive".into()));
        }

        let session_ttl = env_parse::<u64>("SWEARJAR_SESSION_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let refresh_ttl = env_parse::<u64>("SWEARJAR_REFRESH_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_ttl);

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            lock_timeout,
            broadcast_capacity,
            heartbeat_interval,
            session_ttl,
            refresh_ttl,
        })
    }
}

/// Shared state for the node - one instance of each component.
pub struct NodeState {
    pub ledger: Arc<LedgerStore>,
    pub coordinator: Arc<MutationCoordinator>,
    pub broadcaster: Arc<Broadcaster>,
    pub sessions: Arc<SessionStore>,
    pub config: NodeConfig,
}

impl NodeState {
    /// Wire up all components over an opened storage.
    pub fn new(storage: Arc<Storage>, config: NodeConfig) -> Self {
        let ledger = Arc::new(LedgerStore::new(Arc::clone(&storage), config.lock_timeout));
        let broadcaster = Arc::new(Broadcaster::new(config.broadcast_capacity));
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&ledger),
            Arc::clone(&broadcaster),
        ));
        let sessions = Arc::new(SessionStore::new(
            storage,
            config.session_ttl,
            config.refresh_ttl,
        ));

        Self {
            ledger,
            coordinator,
            broadcaster,
            sessions,
            config,
        }
    }
}

/// A swear jar node instance.
pub struct SwearJarNode {
    state: Arc<NodeState>,
    config: NodeConfig,
}

impl SwearJarNode {
    /// Create a new node.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        // Open single shared storage instance
        let storage = Arc::new(Storage::open(&config.data_dir)?);
        let state = Arc::new(NodeState::new(storage, config.clone()));

        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<NodeState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts HTTP server and admin socket).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Swear jar node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        // Start admin socket server in background
        let admin_socket = AdminSocket::new(self.state(), &self.config.admin_socket);
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        // Sweep expired sessions in background
        let sessions = Arc::clone(&self.state.sessions);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = sessions.prune_expired() {
                    tracing::warn!("Session prune failed: {}", e);
                }
            }
        });

        // Build HTTP API
        let app = api::build_router(self.state());

        // Start HTTP server
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
