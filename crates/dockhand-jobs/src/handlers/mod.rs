//! Job handlers for the processing and AI queues.

pub mod ai;
pub mod processor;
pub mod text;
pub mod thumbnail;

pub use ai::AiAnalyzeHandler;
pub use processor::ProcessHandler;
pub use text::{TextExtractor, TextMethod};
pub use thumbnail::ThumbnailGenerator;
