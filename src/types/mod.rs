// Public modules
pub mod attachment;
pub mod category;
pub mod chat_completion;
pub mod model;
pub mod turn;

// Re-exports
pub use attachment::{Attachment, ImageMediaType};
pub use category::Category;
pub use chat_completion::{
    ChatCompletionChunk, ChatCompletionParams, ChunkChoice, ChunkDelta, StreamErrorObject,
};
pub use model::{KNOWN_MODELS, KnownModel, Model, ModelCatalog};
pub use turn::{ChatMessage, ContentPart, ImageUrl, Role, Turn, TurnContent};
