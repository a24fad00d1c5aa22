//! HTTP adapter for the htms pipeline.
//!
//! This crate provides:
//! - `HtmsHandler` - Turns `GET` requests for matching files into streamed responses
//! - `HtmsOptions` - Document root, index file, patterns and pipeline options
//! - `HtmsBody` - Response body (`Stream` and `http_body::Body`) that reports
//!   late failures as HTML comments
//! - `Compressor` - Per-chunk gzip, deflate and brotli compression
//! - `match_file_path` - URL path to file resolution
//! - `negotiate_encoding` - `Accept-Encoding` negotiation

mod body;
mod compression;
mod encoding;
mod handler;
mod matcher;

pub use body::*;
pub use compression::*;
pub use encoding::*;
pub use handler::*;
pub use matcher::*;
