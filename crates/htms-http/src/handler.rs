//! Request handling.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use glob::Pattern;
use htms_core::{HtmsError, PipelineConfig, ResolutionPolicy, Resolver};
use htms_stream::{create_pipeline, file_stream};
use http::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, VARY};
use http::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::body::HtmsBody;
use crate::encoding::{negotiate_encoding, Encoding};
use crate::matcher::{compile_patterns, match_file_path};

/// Errors from building a handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Adapter options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmsOptions {
    /// Document root.
    pub root: PathBuf,
    /// File served for directory paths.
    pub index: String,
    /// Globs, relative to the root, of files to stream.
    pub patterns: Vec<String>,
    /// Compress responses with a negotiated encoding.
    pub compression: bool,
    /// Show error details in responses.
    pub debug: bool,
    /// How task resolution failures are handled.
    pub resolution: ResolutionPolicy,
}

impl Default for HtmsOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            patterns: vec!["**/*.html".to_string(), "**/*.htm".to_string()],
            compression: true,
            debug: false,
            resolution: ResolutionPolicy::Graceful,
        }
    }
}

impl HtmsOptions {
    /// Create options serving `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set the index file name.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    /// Replace the file patterns.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable response compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Show error details in responses.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the resolution policy.
    pub fn with_resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.resolution = resolution;
        self
    }

    /// Pipeline configuration for each document.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_debug(self.debug)
            .with_resolution(self.resolution)
    }
}

/// Serves matching files through a fresh pipeline per request.
pub struct HtmsHandler {
    options: HtmsOptions,
    patterns: Vec<Pattern>,
    resolver: Arc<dyn Resolver>,
}

impl HtmsHandler {
    /// Create a handler.
    pub fn new(options: HtmsOptions, resolver: Arc<dyn Resolver>) -> Result<Self, HandlerError> {
        let mut patterns = Vec::with_capacity(options.patterns.len());
        for pattern in &options.patterns {
            let compiled = compile_patterns([pattern]).map_err(|source| HandlerError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            patterns.extend(compiled);
        }

        Ok(Self {
            options,
            patterns,
            resolver,
        })
    }

    /// Handler options.
    pub fn options(&self) -> &HtmsOptions {
        &self.options
    }

    /// Handle a request.
    ///
    /// Returns `None` when the request is not a `GET` for a matching file,
    /// leaving it to the next handler. The first chunk is awaited before the
    /// response is built, so a failure that early still yields a 500.
    pub async fn handle<B>(&self, request: &Request<B>) -> Option<Response<HtmsBody>> {
        if request.method() != Method::GET {
            return None;
        }

        let url_path = request.uri().path();
        let path = match_file_path(
            &self.options.root,
            &self.options.index,
            &self.patterns,
            url_path,
        )
        .await?;

        tracing::info!(path = %path.display(), "streaming document");

        let mut stream = create_pipeline(
            file_stream(&path),
            self.resolver.clone(),
            &self.options.pipeline_config(),
        );

        let first = match stream.next().await {
            Some(Ok(chunk)) => Some(chunk),
            Some(Err(error)) if error.is_advisory() => {
                tracing::warn!(path = %path.display(), error = %error, "document finished with a warning");
                None
            }
            Some(Err(error)) => {
                tracing::error!(path = %path.display(), error = %error, "document failed before streaming");
                return Some(self.error_response(&error));
            }
            None => None,
        };

        let encoding = if self.options.compression {
            negotiate_encoding(
                request
                    .headers()
                    .get(ACCEPT_ENCODING)
                    .and_then(|v| v.to_str().ok()),
            )
        } else {
            Encoding::Identity
        };

        let body = HtmsBody::streaming(first, stream, self.options.debug).with_encoding(encoding);
        tracing::debug!(path = %path.display(), encoding = %body.encoding(), "response encoding");

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        if encoding != Encoding::Identity {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
        }
        if self.options.compression {
            headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
        }

        Some(response)
    }

    fn error_response(&self, error: &HtmsError) -> Response<HtmsBody> {
        let text = if self.options.debug {
            error.to_string()
        } else {
            "Internal Server Error".to_string()
        };

        let mut response = Response::new(HtmsBody::text(text));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
