//! Swear jar node binary
//!
//! Shared swear jar ledger with a real-time transaction feed.

use swearjar_node::{NodeConfig, SwearJarNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swearjar_node=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting swear jar node");

    let config = NodeConfig::from_env()?;

    // Create and run node
    let node = SwearJarNode::new(config).await?;
    node.run().await?;

    Ok(())
}
