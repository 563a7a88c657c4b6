use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status shared by every persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    None,
    New,
    #[default]
    Active,
    Blocked,
    Archive,
    Deleted,
    Public,
    Busy,
    Error,
    Submitted,
    Rejected,
}

impl ResourceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::New => "NEW",
            Self::Active => "ACTIVE",
            Self::Blocked => "BLOCKED",
            Self::Archive => "ARCHIVE",
            Self::Deleted => "DELETED",
            Self::Public => "PUBLIC",
            Self::Busy => "BUSY",
            Self::Error => "ERROR",
            Self::Submitted => "SUBMITTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Converts a stored status string back to its variant.
    pub fn parse(s: &str) -> Option<ResourceStatus> {
        match s {
            "NONE" => Some(Self::None),
            "NEW" => Some(Self::New),
            "ACTIVE" => Some(Self::Active),
            "BLOCKED" => Some(Self::Blocked),
            "ARCHIVE" => Some(Self::Archive),
            "DELETED" => Some(Self::Deleted),
            "PUBLIC" => Some(Self::Public),
            "BUSY" => Some(Self::Busy),
            "ERROR" => Some(Self::Error),
            "SUBMITTED" => Some(Self::Submitted),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    #[serde(alias = "system")]
    System,
    #[default]
    #[serde(alias = "user")]
    User,
    #[serde(alias = "assistant")]
    Assistant,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }

    /// Lower-case role name used on the chat-completion wire format.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<MessageRole> {
        match s {
            "SYSTEM" => Some(Self::System),
            "USER" => Some(Self::User),
            "ASSISTANT" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
