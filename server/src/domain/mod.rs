//! Domain logic: upstream client, SSE framing, and the streaming pipeline

pub mod openrouter;
pub mod pipeline;
pub mod sse;

pub use openrouter::{OpenRouterClient, OpenRouterError};
pub use pipeline::{PreparedStream, StreamContext, StreamParams};
pub use sse::{SseEvent, SseFrame};
