pub mod pipeline;
pub mod providers;

pub use pipeline::{ChatPipeline, RECENT_RECORD_LIMIT, RECENT_TURN_LIMIT};
pub use providers::{GeminiProvider, GenerateRequest, LlmProvider};
