//! Upstream provider client and wire types

pub mod client;
pub mod types;

pub use client::{ChatStream, OpenRouterClient, OpenRouterError};
pub use types::{
    CatalogModel, ChatMessage, ChatRequest, StreamEvent, UsageCounts, UsageOptions,
};
