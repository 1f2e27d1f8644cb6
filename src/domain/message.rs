use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::account::{AccountId, FolderId};
use crate::mail::decoders::{decode_subject, parse_sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Email,
    Sms,
    Instant,
    Other,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Email => "email",
            MessageType::Sms => "sms",
            MessageType::Instant => "instant",
            MessageType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "email" => MessageType::Email,
            "sms" => MessageType::Sms,
            "instant" => MessageType::Instant,
            _ => MessageType::Other,
        }
    }
}

/// Status bits as stored alongside each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFlags(pub u32);

impl StatusFlags {
    pub const READ: StatusFlags = StatusFlags(1 << 0);
    pub const TEMPORARY: StatusFlags = StatusFlags(1 << 1);
    pub const NO_NOTIFICATION: StatusFlags = StatusFlags(1 << 2);
    pub const JUNK: StatusFlags = StatusFlags(1 << 3);
    pub const TRASH: StatusFlags = StatusFlags(1 << 4);
    pub const OUTBOX: StatusFlags = StatusFlags(1 << 5);

    pub fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: StatusFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlags) -> StatusFlags {
        StatusFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StatusFlags {
    fn bitor_assign(&mut self, rhs: StatusFlags) {
        self.0 |= rhs.0;
    }
}

/// What the store currently knows about a message.
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    pub id: MessageId,
    pub message_type: MessageType,
    pub status: StatusFlags,
    pub folder_id: FolderId,
    pub account_id: AccountId,
    /// Raw `From` header value, e.g. `"Jane Doe <Jane@Example.org>"`.
    pub from: String,
    /// Raw subject, possibly RFC 2047 encoded.
    pub subject: String,
    pub date: DateTime<Utc>,
    pub recipient_count: u32,
}

/// Immutable view of a notifiable message, built once when it qualifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub account_id: AccountId,
    /// Sender address, lower-cased.
    pub origin: String,
    /// Sender display name, may be empty.
    pub sender: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub has_multiple_recipients: bool,
}

impl MessageRecord {
    pub fn from_snapshot(snapshot: &MessageSnapshot) -> Self {
        let (origin, sender) = parse_sender(&snapshot.from);
        Self {
            id: snapshot.id,
            account_id: snapshot.account_id,
            origin,
            sender,
            subject: decode_subject(snapshot.subject.as_bytes()),
            timestamp: snapshot.date,
            has_multiple_recipients: snapshot.recipient_count > 1,
        }
    }

    /// Sender name, falling back to the address.
    pub fn display_sender(&self) -> &str {
        if self.sender.is_empty() {
            &self.origin
        } else {
            &self.sender
        }
    }
}
