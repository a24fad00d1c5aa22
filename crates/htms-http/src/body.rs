//! Streamed response body.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{ready, Stream, StreamExt};
use htms_core::HtmsError;
use htms_stream::HtmsStream;
use http_body::Frame;

use crate::compression::Compressor;
use crate::encoding::Encoding;

/// Response body fed by a pipeline.
///
/// Once the response has started, a failure can no longer change the
/// status, so it is appended as an HTML comment and the body ends.
/// Dropping the body early (client gone) drops the pipeline with it.
///
/// Usable as a `futures::Stream` of `Bytes` or as an `http_body::Body`,
/// so it can be handed to hyper or axum as is.
pub struct HtmsBody {
    first: Option<String>,
    stream: Option<HtmsStream>,
    compressor: Option<Compressor>,
    debug: bool,
}

impl HtmsBody {
    /// Body continuing a pipeline whose first chunk was already pulled.
    pub fn streaming(first: Option<String>, stream: HtmsStream, debug: bool) -> Self {
        Self {
            first,
            stream: Some(stream),
            compressor: None,
            debug,
        }
    }

    /// Fixed body.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            first: Some(text.into()),
            stream: None,
            compressor: None,
            debug: false,
        }
    }

    /// Empty body.
    pub fn empty() -> Self {
        Self {
            first: None,
            stream: None,
            compressor: None,
            debug: false,
        }
    }

    /// Compress the body with `encoding`, flushing after every chunk.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.compressor = Compressor::new(encoding);
        self
    }

    /// Encoding applied to the body.
    pub fn encoding(&self) -> Encoding {
        self.compressor
            .as_ref()
            .map_or(Encoding::Identity, Compressor::encoding)
    }

    /// Collect the remaining body bytes.
    pub async fn into_bytes(self) -> Vec<u8> {
        self.collect::<Vec<Bytes>>().await.concat()
    }

    /// Collect the remaining body as text.
    pub async fn into_string(self) -> String {
        String::from_utf8_lossy(&self.into_bytes().await).into_owned()
    }

    fn poll_text(&mut self, cx: &mut Context<'_>) -> Poll<Option<String>> {
        if let Some(chunk) = self.first.take() {
            return Poll::Ready(Some(chunk));
        }

        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(None);
        };

        let item = ready!(stream.poll_next_unpin(cx));
        match item {
            Some(Ok(chunk)) => Poll::Ready(Some(chunk)),
            Some(Err(error)) => {
                self.stream = None;
                if error.is_advisory() {
                    tracing::warn!(error = %error, "document finished with a warning");
                    Poll::Ready(None)
                } else {
                    tracing::error!(error = %error, "document failed after streaming started");
                    Poll::Ready(Some(error_comment(&error, self.debug)))
                }
            }
            None => {
                self.stream = None;
                Poll::Ready(None)
            }
        }
    }
}

/// Render a late pipeline failure as an HTML comment.
pub fn error_comment(error: &HtmsError, debug: bool) -> String {
    let message = if debug {
        error.to_string().replace("--", "- -")
    } else {
        "the document could not be completed".to_string()
    };
    format!("<!-- htms error: {} -->", message)
}

impl Stream for HtmsBody {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let compressed = match ready!(self.poll_text(cx)) {
                Some(text) => match self.compressor.as_mut() {
                    Some(compressor) => compressor.compress(text.as_bytes()),
                    None => return Poll::Ready(Some(Bytes::from(text))),
                },
                None => match self.compressor.take() {
                    Some(compressor) => compressor.finish(),
                    None => return Poll::Ready(None),
                },
            };

            match compressed {
                Ok(data) if data.is_empty() => continue,
                Ok(data) => return Poll::Ready(Some(Bytes::from(data))),
                Err(error) => {
                    tracing::error!(error = %error, "response compression failed");
                    self.first = None;
                    self.stream = None;
                    self.compressor = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl http_body::Body for HtmsBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Stream::poll_next(self, cx).map(|chunk| chunk.map(|data| Ok(Frame::data(data))))
    }

    fn is_end_stream(&self) -> bool {
        self.first.is_none() && self.stream.is_none() && self.compressor.is_none()
    }
}

impl Drop for HtmsBody {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!("client went away before the document completed");
        }
    }
}
