//! Swear Jar Node - Shared Ledger Service
//!
//! Hosts shared swear jars: named groups of members with running balances,
//! mutated concurrently by several authorized users, with every committed
//! change pushed to connected observers in real time.
//!
//! # Architecture
//!
//! - **Storage**: RocksDB-backed persistence for jars, transactions and sessions
//! - **Ledger**: Per-jar serialized read-modify-write over storage
//! - **Coordinator**: Authorization + validation + commit + publish
//! - **Broadcast**: Best-effort fan-out of committed transactions
//! - **API**: HTTP endpoints and the WebSocket transaction feed
//! - **Admin Socket**: Unix socket for local admin commands (swearjar-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use swearjar_node::{NodeConfig, SwearJarNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let node = SwearJarNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod broadcast;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod node;
pub mod sessions;
pub mod storage;
pub mod ws;

pub use broadcast::{Broadcaster, Delivery, Subscription};
pub use coordinator::MutationCoordinator;
pub use error::{Error, Result};
pub use ledger::LedgerStore;
pub use node::{NodeConfig, NodeState, SwearJarNode};
pub use sessions::{SessionStore, SessionTokens};
pub use storage::Storage;
