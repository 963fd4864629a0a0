use serde::{Deserialize, Serialize};

use super::Snowflake;

/// Message type as reported by the platform.
///
/// Only the distinctions retention cares about get their own variant; every
/// other type code is carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum MessageKind {
    #[default]
    Default,
    /// First message of a thread, shown in the parent channel.
    ThreadStarter,
    Other(u8),
}

impl MessageKind {
    const DEFAULT_CODE: u8 = 0;
    const THREAD_STARTER_CODE: u8 = 21;
}

impl From<u8> for MessageKind {
    fn from(code: u8) -> Self {
        match code {
            Self::DEFAULT_CODE => MessageKind::Default,
            Self::THREAD_STARTER_CODE => MessageKind::ThreadStarter,
            other => MessageKind::Other(other),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Default => MessageKind::DEFAULT_CODE,
            MessageKind::ThreadStarter => MessageKind::THREAD_STARTER_CODE,
            MessageKind::Other(code) => code,
        }
    }
}

/// Reference to a thread started from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub id: Snowflake,
}

/// The subset of a platform message the scheduler reads.
///
/// Unknown fields in API payloads are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub pinned: bool,
    /// Thread started from this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadRef>,
}

impl Message {
    pub fn new(id: impl Into<Snowflake>) -> Self {
        Self {
            id: id.into(),
            kind: MessageKind::Default,
            pinned: false,
            thread: None,
        }
    }

    pub fn is_thread_starter(&self) -> bool {
        self.kind == MessageKind::ThreadStarter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_payload() {
        let json = r#"{
            "id": "1100000000000000000",
            "type": 0,
            "content": "hello",
            "pinned": true,
            "author": {"id": "1", "username": "someone"},
            "thread": {"id": "1100000000000000001", "name": "topic"}
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, Snowflake::new(1_100_000_000_000_000_000));
        assert!(message.pinned);
        assert_eq!(
            message.thread,
            Some(ThreadRef {
                id: Snowflake::new(1_100_000_000_000_000_001)
            })
        );
    }

    #[test]
    fn test_missing_optional_fields() {
        let message: Message = serde_json::from_str(r#"{"id": "5"}"#).unwrap();
        assert_eq!(message, Message::new(5u64));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(MessageKind::from(21), MessageKind::ThreadStarter);
        assert_eq!(MessageKind::from(0), MessageKind::Default);
        assert_eq!(MessageKind::from(19), MessageKind::Other(19));
        assert_eq!(u8::from(MessageKind::Other(19)), 19);

        let starter: Message = serde_json::from_str(r#"{"id": "5", "type": 21}"#).unwrap();
        assert!(starter.is_thread_starter());
    }
}
