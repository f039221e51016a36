use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record for an account holder. Created at registration and never
/// mutated by the chat pipeline; the password hash lives in the store, not
/// here, so this shape is safe to serialize to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One physiological measurement. Immutable once created except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub id: i64,
    pub user_id: i64,
    /// Free-form category, e.g. "BPM", "Weight", "Glucose".
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HealthRecord {
    /// Render as `type: value unit` for prompt context.
    pub fn summary(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{}: {} {}", self.kind, self.value, unit),
            None => format!("{}: {}", self.kind, self.value),
        }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(format!("unknown chat role: {s}")),
        }
    }
}

/// One persisted conversation turn. Turns are only ever created in
/// user/assistant pairs by the turn persister.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
