// Public modules
pub mod assembler;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod render;
pub mod session;
pub mod sse;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use assembler::{RequestAssembler, system_instruction};
pub use client::{API_KEY_ENV, ChatBackend, ChunkStream, OpenRouter, TextStream};
pub use client_logger::{ClientLogger, TracingClientLogger};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use session::{DEFAULT_CONTEXT_TURNS, Session};
pub use types::*;
