//! Chat platform client.
//!
//! The scheduler only talks to the platform through [`ChatPlatform`], so
//! tests can substitute an in-memory fake for the Discord REST client.

mod discord;
mod error;
pub mod retry;

use async_trait::async_trait;
pub use discord::DiscordClient;
pub use error::{PlatformError, UNAVAILABLE_CODES};

use crate::models::{Message, Snowflake};

/// Page request for a channel's message history.
///
/// With `before`, the page holds the newest messages older than the cursor.
/// With `after`, it holds the oldest messages newer than the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: u32,
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
}

impl MessageQuery {
    pub fn before(cursor: Snowflake, limit: u32) -> Self {
        Self {
            limit,
            before: Some(cursor),
            after: None,
        }
    }

    pub fn after(cursor: Snowflake, limit: u32) -> Self {
        Self {
            limit,
            before: None,
            after: Some(cursor),
        }
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Fetch one page of a channel's messages, newest first.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<Message>, PlatformError>;

    /// Delete messages from a channel.
    ///
    /// An empty set is a no-op that performs no request.
    async fn bulk_delete(
        &self,
        channel_id: &str,
        message_ids: &[Snowflake],
    ) -> Result<(), PlatformError>;

    /// Delete a channel or thread.
    async fn delete_channel(&self, channel_id: &str) -> Result<(), PlatformError>;
}
