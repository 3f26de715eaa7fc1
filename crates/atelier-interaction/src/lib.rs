//! Model interaction layer: the gateway HTTP client, requirement
//! analysis, and code generation sessions.

pub mod analyzer;
pub mod client;
pub mod prompts;
pub mod session;
pub mod sse;
pub mod testing;

pub use analyzer::{AnalyzerEvent, RequirementAnalyzer};
pub use client::HttpModelClient;
pub use session::{GenerationEvent, GenerationSession};
