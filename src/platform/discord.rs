use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Serialize;

use super::{ChatPlatform, MessageQuery, PlatformError, retry::with_retry};
use crate::{
    config::{DiscordConfig, RetryConfig},
    models::{Message, Snowflake},
};

/// Largest id list the bulk endpoint accepts.
const BULK_DELETE_MAX: usize = 100;

const BOT_USER_AGENT: &str = concat!("DiscordBot (hourglass, ", env!("CARGO_PKG_VERSION"), ")");

/// Discord REST API client authenticated as a bot.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    authorization: String,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct BulkDeleteBody<'a> {
    messages: &'a [Snowflake],
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            authorization: format!("Bot {}", config.token),
            retry: config.retry.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send with retries and turn unsuccessful statuses into errors.
    async fn execute<F>(
        &self,
        operation: &str,
        build: F,
    ) -> Result<reqwest::Response, PlatformError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let response = with_retry(&self.retry, operation, || {
            build()
                .header(AUTHORIZATION, &self.authorization)
                .header(USER_AGENT, BOT_USER_AGENT)
                .send()
        })
        .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::from_status(status.as_u16(), &body))
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}/messages/{message_id}"));
        self.execute("delete_message", || self.http.delete(&url))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn fetch_messages(
        &self,
        channel_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<Message>, PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}/messages"));

        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = query.before {
            params.push(("before", before.to_string()));
        }
        if let Some(after) = query.after {
            params.push(("after", after.to_string()));
        }

        let response = self
            .execute("fetch_messages", || self.http.get(&url).query(&params))
            .await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn bulk_delete(
        &self,
        channel_id: &str,
        message_ids: &[Snowflake],
    ) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}/messages/bulk-delete"));

        for chunk in message_ids.chunks(BULK_DELETE_MAX) {
            if let [only] = chunk {
                self.delete_message(channel_id, *only).await?;
                continue;
            }

            let body = BulkDeleteBody { messages: chunk };
            self.execute("bulk_delete", || self.http.post(&url).json(&body))
                .await?;
        }

        Ok(())
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel_id}"));
        self.execute("delete_channel", || self.http.delete(&url))
            .await?;
        Ok(())
    }
}
