//! Data model for the generation service

pub mod job;

pub use job::{GenerationJob, JobSnapshot, JobStatus, LineImage, LyricLine};
