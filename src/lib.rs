//! # llm-structured
//!
//! A multi-backend LLM completion client that turns an arbitrary,
//! operator-supplied API endpoint plus a structured-output contract into a
//! validated, strongly-typed result.
//!
//! ## Overview
//!
//! Three incompatible wire dialects are supported behind one interface:
//! OpenAI-compatible REST, Gemini native REST and Gemini's OpenAI
//! compatibility layer. The configured base URL is never rewritten; the
//! client derives models-list and completion URLs from it, detecting
//! protocol path segments that are already present so they are never
//! duplicated.
//!
//! Responses are treated defensively (wrong content-type, empty bodies,
//! non-JSON gateway pages, malformed JSON) and model text is pushed through
//! a layered recovery pipeline: direct parse, fenced block, bracket scan,
//! schema-aware salvage via caller-registered [`ShapeRecognizer`]s, and a
//! final remote repair pass.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use llm_structured::{CallMode, CompletionRequest, LlmClient};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Point { x: i64, y: i64 }
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Answer { points: Vec<Point> }
//!
//! #[tokio::main]
//! async fn main() -> llm_structured::Result<()> {
//!     let client = LlmClient::builder()
//!         .mode(CallMode::GeminiNative)
//!         .base_url("https://generativelanguage.googleapis.com")
//!         .api_key("your-api-key")
//!         .model("gemini-2.5-pro")
//!         .default_shapes()
//!         .build()?;
//!
//!     client.preflight().await?;
//!
//!     let request = CompletionRequest::new()
//!         .with_image("challenge.png")
//!         .with_prompt("Click on the bird");
//!     let answer: Answer = client.complete(&request).await?;
//!     println!("{} points", answer.points.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoint;
pub mod structured;
pub mod transport;

// Re-export main types for convenience
pub use client::{
    preflight, ClientBuilder, ClientConfig, CompletionRequest, LlmClient, ResponseSnapshot,
};
pub use endpoint::{completion_url, join_url, models_url, CallMode};
pub use structured::{
    extract_json, json_schema_from_type, Extraction, LabelShape, OutputValidator, PathShape,
    PointListShape, ShapeRecognizer, Stage, ValidationError,
};
pub use transport::ResponseError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
