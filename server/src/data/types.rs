//! Typed rows and validated enums
//!
//! Every boundary (repository return, cache value, pipeline input) uses an
//! explicit record with named fields. Role and session type are closed enums
//! validated at parse time; raw strings never travel past the data layer.

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation container type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Chat,
    Code,
    Documents,
    Playground,
}

impl SessionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionType::Chat => "chat",
            SessionType::Code => "code",
            SessionType::Documents => "documents",
            SessionType::Playground => "playground",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(SessionType::Chat),
            "code" => Some(SessionType::Code),
            "documents" => Some(SessionType::Documents),
            "playground" => Some(SessionType::Playground),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog row for an upstream model. Bulk upserted by sync; unit prices are
/// dollars per token (normalized on ingest), NULL when the provider does not
/// publish one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    pub id: String,
    pub name: String,
    pub context_length: i64,
    pub prompt_price: Option<f64>,
    pub completion_price: Option<f64>,
    pub supports_reasoning: bool,
    pub created_at: i64,
}

/// Reusable generation preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: i64,
    pub name: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub preset: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Conversation container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub session_type: SessionType,
    pub title: Option<String>,
    pub profile_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One utterance in a session. Per session, messages are totally ordered by
/// `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// Per-completion accounting row, appended once per successful stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    pub id: String,
    pub session_id: String,
    pub profile_id: Option<i64>,
    pub model_id: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost_usd: f64,
    pub created_at: i64,
}

/// One ranked full-text search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub message_id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
    pub session_type: SessionType,
    pub session_title: Option<String>,
    /// Matched fragment with inline `<mark>` highlights
    pub snippet: String,
    /// Raw BM25 score; lower is better
    pub rank: f64,
}

/// One bucket of the usage timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePeriod {
    pub period: String,
    pub total_tokens: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_cost: f64,
    pub request_count: i64,
}

/// Aggregate usage statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageTotals {
    pub total_requests: i64,
    pub total_tokens: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_cost: f64,
    pub unique_models: i64,
    pub unique_sessions: i64,
    pub avg_cost_per_request: f64,
    pub first_at: Option<i64>,
    pub last_at: Option<i64>,
}

/// Per-model usage breakdown row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub model_id: String,
    pub request_count: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("moderator"), None);
    }

    #[test]
    fn test_session_type_roundtrip() {
        for st in [
            SessionType::Chat,
            SessionType::Code,
            SessionType::Documents,
            SessionType::Playground,
        ] {
            assert_eq!(SessionType::parse(st.as_str()), Some(st));
        }
        assert_eq!(SessionType::parse("notebook"), None);
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        let parsed: SessionType = serde_json::from_str("\"playground\"").unwrap();
        assert_eq!(parsed, SessionType::Playground);
    }
}
