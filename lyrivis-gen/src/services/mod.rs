//! Services for lyric image generation

pub mod dedup_cache;
pub mod generator;
pub mod image_store;
pub mod lyrics;
pub mod orchestrator;
pub mod throttle;

pub use dedup_cache::DedupCache;
pub use generator::{HttpImageGenerator, ImageGenerator};
pub use image_store::ImageStore;
pub use lyrics::{HttpLyricsProvider, LyricsProvider};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
