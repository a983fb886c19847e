//! Provider wire types

use serde::{Deserialize, Serialize};

use crate::data::types::{ModelRow, Role};

/// One turn of a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Streaming chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    pub stream: bool,
    pub usage: UsageOptions,
}

/// Asks the provider to attach token accounting to the stream
#[derive(Debug, Clone, Serialize)]
pub struct UsageOptions {
    pub include: bool,
}

/// Token accounting snapshot. The provider may refine counts while the
/// stream is open; the last snapshot wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

/// One decoded chunk payload
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    pub usage: Option<UsageCounts>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
}

/// In-band error payload streamed by the provider
#[derive(Debug, Deserialize)]
pub struct ApiErrorPayload {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: Option<i64>,
}

/// Decoded event from the completion stream
#[derive(Debug)]
pub enum StreamEvent {
    /// A text piece, possibly with a usage snapshot riding along
    Delta {
        text: String,
        usage: Option<UsageCounts>,
    },
    /// The `[DONE]` sentinel
    Done,
}

// =============================================================================
// Model catalog
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    pub data: Vec<CatalogModel>,
}

/// One catalog entry as served by the provider. Prices arrive as decimal
/// strings in dollars per token.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogModel {
    pub id: String,
    pub name: Option<String>,
    pub context_length: Option<i64>,
    pub pricing: Option<CatalogPricing>,
    #[serde(default)]
    pub supported_parameters: Vec<String>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPricing {
    pub prompt: Option<String>,
    pub completion: Option<String>,
}

impl CatalogModel {
    /// Normalize a catalog entry into a store row. Prices are parsed into
    /// dollars per token; unparsable or negative values become unknown.
    pub fn into_row(self, now: i64) -> ModelRow {
        let (prompt_price, completion_price) = match &self.pricing {
            Some(pricing) => (
                parse_price(pricing.prompt.as_deref()),
                parse_price(pricing.completion.as_deref()),
            ),
            None => (None, None),
        };

        let supports_reasoning = self
            .supported_parameters
            .iter()
            .any(|p| p == "reasoning" || p == "include_reasoning");

        ModelRow {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            context_length: self.context_length.unwrap_or(0).max(0),
            prompt_price,
            completion_price,
            supports_reasoning,
            created_at: self.created.unwrap_or(now),
        }
    }
}

fn parse_price(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_unset_options() {
        let request = ChatRequest {
            model: "acme/small".to_string(),
            messages: vec![ChatMessage::new(Role::User, "hi")],
            temperature: None,
            max_tokens: Some(256),
            stream: true,
            usage: UsageOptions { include: true },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_catalog_row_normalizes_prices() {
        let model = CatalogModel {
            id: "acme/small".to_string(),
            name: Some("Acme Small".to_string()),
            context_length: Some(8192),
            pricing: Some(CatalogPricing {
                prompt: Some("0.000001".to_string()),
                completion: Some("0.000002".to_string()),
            }),
            supported_parameters: vec!["temperature".to_string(), "reasoning".to_string()],
            created: Some(1_700_000_000),
        };

        let row = model.into_row(0);
        assert_eq!(row.prompt_price, Some(1e-6));
        assert_eq!(row.completion_price, Some(2e-6));
        assert!(row.supports_reasoning);
        assert_eq!(row.created_at, 1_700_000_000);
    }

    #[test]
    fn test_catalog_row_unknown_prices() {
        let model = CatalogModel {
            id: "acme/odd".to_string(),
            name: None,
            context_length: None,
            pricing: Some(CatalogPricing {
                prompt: Some("free".to_string()),
                completion: Some("-1".to_string()),
            }),
            supported_parameters: vec![],
            created: None,
        };

        let row = model.into_row(42);
        assert_eq!(row.name, "acme/odd");
        assert_eq!(row.prompt_price, None);
        assert_eq!(row.completion_price, None);
        assert!(!row.supports_reasoning);
        assert_eq!(row.created_at, 42);
        assert_eq!(row.context_length, 0);
    }

    #[test]
    fn test_usage_counts_default_fields() {
        let usage: UsageCounts = serde_json::from_str("{\"prompt_tokens\": 3}").unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 0);
    }
}
