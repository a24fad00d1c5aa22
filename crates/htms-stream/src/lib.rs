//! Out-of-order streaming HTML pipeline.
//!
//! Three stages connected by streams:
//! - `tokenize` - Incremental tokenizer detecting task markers and module scopes
//! - `resolve_tokens` - Binds each marker to runnable work via a `Resolver`
//! - `serialize` - Streams the document, then appends task results as chunks
//!
//! `create_pipeline` / `PipelineBuilder` compose the stages, and
//! `drive_to_sink` writes the result to any byte sink.

mod chunk;
mod pipeline;
mod resolver;
mod serializer;
mod sink;
mod tokenizer;

pub use chunk::*;
pub use pipeline::*;
pub use resolver::*;
pub use serializer::*;
pub use sink::*;
pub use tokenizer::*;
