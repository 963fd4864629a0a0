use serde::Deserialize;

/// JSON error codes meaning the bot can no longer see or act on a channel.
///
/// 10003 Unknown Channel, 50001 Missing Access, 50013 Missing Permissions.
pub const UNAVAILABLE_CODES: [u64; 3] = [10003, 50001, 50013];

/// Failure talking to the chat platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The channel is gone or access was revoked. Not worth retrying.
    #[error("channel unavailable (status {status}, code {code:?}): {message}")]
    Unavailable {
        status: u16,
        code: Option<u64>,
        message: String,
    },

    /// Rate limits, server errors and any other rejected request.
    #[error("platform request failed (status {status}, code {code:?}): {message}")]
    Transient {
        status: u16,
        code: Option<u64>,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether this failure means the channel should stop being tracked.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PlatformError::Unavailable { .. })
    }

    /// Classify an unsuccessful response from its status and body.
    ///
    /// The JSON `code` decides when present. Without one, 403 and 404 are
    /// treated as unavailable.
    pub fn from_status(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            code: Option<u64>,
            message: Option<String>,
        }

        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let code = parsed.as_ref().and_then(|b| b.code);
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.trim().to_string());

        let unavailable = match code {
            Some(code) => UNAVAILABLE_CODES.contains(&code),
            None => matches!(status, 403 | 404),
        };

        if unavailable {
            PlatformError::Unavailable {
                status,
                code,
                message,
            }
        } else {
            PlatformError::Transient {
                status,
                code,
                message,
            }
        }
    }
}
