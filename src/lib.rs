// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod folding_stream;
pub mod observability;
pub mod reducer;
pub mod render;
pub mod sse;
pub mod types;

// Re-exports
pub use client::{ByteStream, ChatClient, Transport};
pub use error::{Error, Result};
pub use folding_stream::FoldingStream;
pub use observability::register_biometrics;
pub use reducer::{reduce, reduce_all};
pub use render::{PlainTextRenderer, Renderer};
pub use sse::{EventCodec, decode_events, parse_segment};
pub use types::*;
