// Public modules
pub mod chat_payload;
pub mod chat_stream_request;
pub mod conversation;
pub mod message;
pub mod stream_event;

// Re-exports
pub use chat_payload::{ChatPayload, ChatResponse, ErrorDetail, HealthStatus, MAX_CHAT_MESSAGE_CHARS};
pub use chat_stream_request::ChatStreamRequest;
pub use conversation::Conversation;
pub use message::{Message, MessageId, MessageRole};
pub use stream_event::{StreamEvent, StreamEventPayload};
