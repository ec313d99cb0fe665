//! Change broadcaster - real-time fan-out of committed transactions.
//!
//! Created once per node and shared by reference with the coordinator and
//! the WebSocket layer. Delivery is best effort: no acknowledgements, no
//! backlog for late subscribers, and a subscriber that falls more than
//! `capacity` transactions behind loses the oldest ones (it is told how
//! many, so it can re-fetch history).

use futures::Stream;
use swearjar_ledger::Transaction;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A committed transaction
    Transaction(Transaction),
    /// Transactions dropped because the subscriber fell behind
    Lagged(u64),
}

/// Publishes committed transactions to every live subscriber.
pub struct Broadcaster {
    sender: broadcast::Sender<Transaction>,
}

impl Broadcaster {
    /// Create a broadcaster buffering up to `capacity` transactions per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget publish. Never fails the caller.
    pub fn publish(&self, transaction: &Transaction) {
        match self.sender.send(transaction.clone()) {
            Ok(receivers) => debug!(
                txn_id = %transaction.id,
                jar_id = %transaction.jar_id,
                receivers,
                "Published transaction"
            ),
            // No subscribers right now
            Err(_) => trace!(txn_id = %transaction.id, "No observers for transaction"),
        }
    }

    /// Subscribe to all jars, or only to `jar_filter`.
    pub fn subscribe(&self, jar_filter: Option<String>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            jar_filter,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A live, non-restartable feed of transactions.
pub struct Subscription {
    receiver: broadcast::Receiver<Transaction>,
    jar_filter: Option<String>,
}

impl Subscription {
    /// Jar this subscription is restricted to, if any.
    pub fn jar_filter(&self) -> Option<&str> {
        self.jar_filter.as_deref()
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        self.jar_filter
            .as_deref()
            .map_or(true, |jar_id| jar_id == transaction.jar_id)
    }

    /// Wait for the next delivery. `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(transaction) => {
                    if self.matches(&transaction) {
                        return Some(Delivery::Transaction(transaction));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, jar_filter = ?self.jar_filter, "Subscriber lagged, dropped transactions");
                    return Some(Delivery::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a lazy stream.
    pub fn into_stream(self) -> impl Stream<Item = Delivery> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|delivery| (delivery, subscription))
        })
    }
}
