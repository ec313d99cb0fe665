//! Swear Jar View
//!
//! Keeps a client's copy of one jar in step with the node: load a snapshot
//! over REST, then feed it the frames of the WebSocket transaction feed and
//! the outcomes of the client's own mutations. Transactions are deduplicated
//! by id, kept in revision order, and any revision gap marks the view as
//! needing a re-fetch.

pub mod error;
pub mod view;

pub use error::{Error, Result};
pub use view::{Applied, JarView};
