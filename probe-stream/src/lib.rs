#![deny(missing_docs)]
//! Client and incremental response reader for Ollama's `/api/generate`.
//!
//! # Usage
//!
//! ```no_run
//! use futures::StreamExt;
//! use probe_stream::{GenerateOptions, Ollama, ReadEvent};
//!
//! # async fn run() -> Result<(), probe_stream::GenerateError> {
//! let client = Ollama::new().model("llama3.2");
//! let mut events = client
//!     .stream_incremental("Why is the sky blue?", GenerateOptions::default())
//!     .await?;
//!
//! while let Some(event) = events.next().await {
//!     match event? {
//!         ReadEvent::Fragment(text) => print!("{text}"),
//!         ReadEvent::Done(result) => println!("\n{:?} tokens", result.eval_count),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - Streaming (NDJSON) and non-streaming generation
//! - Partial text is kept on malformed lines and early disconnects
//! - Distinct error kinds for HTTP status, decode, truncation and transport failures

pub mod client;
pub mod error;
pub mod streaming;
pub mod types;

pub use client::Ollama;
pub use error::GenerateError;
pub use streaming::{
    EventStream, ReadEvent, read_all, read_all_bytes, read_incremental, read_incremental_bytes,
};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse, ResponseChunk, StreamResult};
