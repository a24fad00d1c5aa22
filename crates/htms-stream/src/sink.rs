//! Drives a pipeline into a byte sink.

use std::fmt::Display;

use futures::{Sink, SinkExt, Stream, StreamExt};
use htms_core::HtmsError;

/// State of the streaming sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Accepting chunks.
    Open,
    /// Closed after the last chunk.
    Completed,
    /// The receiving side went away.
    Aborted,
}

/// Errors from writing to the sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink already completed")]
    Completed,

    #[error("Sink closed: {0}")]
    Closed(String),
}

/// Summary of a finished drive.
#[derive(Debug, Default)]
pub struct DriveOutcome {
    /// Chunks written.
    pub chunks: usize,
    /// Bytes written.
    pub bytes: usize,
    /// Advisory failure reported after the output was complete.
    pub advisory: Option<HtmsError>,
    /// Whether the consumer disconnected before the end.
    pub aborted: bool,
}

/// Writes pipeline chunks to any `Sink<Vec<u8>>`.
///
/// A write failure is treated as the consumer going away: the pipeline is
/// dropped and no further chunks are produced.
pub struct StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    state: SinkState,
    chunks_sent: usize,
    bytes_sent: usize,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S) -> Self {
        Self {
            inner: sink,
            state: SinkState::Open,
            chunks_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Send one chunk.
    pub async fn send_chunk(&mut self, chunk: &str) -> Result<(), SinkError> {
        match self.state {
            SinkState::Open => {}
            SinkState::Completed => return Err(SinkError::Completed),
            SinkState::Aborted => return Err(SinkError::Closed("consumer gone".to_string())),
        }

        if let Err(e) = self.inner.send(chunk.as_bytes().to_vec()).await {
            self.state = SinkState::Aborted;
            return Err(SinkError::Closed(e.to_string()));
        }
        self.chunks_sent += 1;
        self.bytes_sent += chunk.len();

        Ok(())
    }

    /// Close the underlying sink.
    pub async fn complete(&mut self) -> Result<(), SinkError> {
        if self.state != SinkState::Open {
            return Err(SinkError::Completed);
        }
        self.state = SinkState::Completed;
        self.inner
            .close()
            .await
            .map_err(|e| SinkError::Closed(e.to_string()))
    }

    /// Write every chunk of `stream`, then close the sink.
    ///
    /// Advisory failures are logged and returned in the outcome. Any other
    /// failure closes the sink and is returned as the error.
    pub async fn pipe<St>(mut self, stream: St) -> Result<DriveOutcome, HtmsError>
    where
        St: Stream<Item = Result<String, HtmsError>>,
    {
        futures::pin_mut!(stream);
        let mut advisory = None;

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if let Err(e) = self.send_chunk(&chunk).await {
                        tracing::debug!(error = %e, "consumer disconnected, stopping pipeline");
                        return Ok(self.outcome(advisory, true));
                    }
                }
                Err(e) if e.is_advisory() => {
                    tracing::warn!(error = %e, "pipeline finished with a warning");
                    advisory = Some(e);
                }
                Err(e) => {
                    if let Err(close) = self.complete().await {
                        tracing::debug!(error = %close, "sink did not close after pipeline failure");
                    }
                    return Err(e);
                }
            }
        }

        let aborted = self.complete().await.is_err();
        Ok(self.outcome(advisory, aborted))
    }

    fn outcome(&self, advisory: Option<HtmsError>, aborted: bool) -> DriveOutcome {
        DriveOutcome {
            chunks: self.chunks_sent,
            bytes: self.bytes_sent,
            advisory,
            aborted,
        }
    }

    /// Number of chunks written so far.
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    /// Number of bytes written so far.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Consume the sink and return the inner value.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Write a pipeline's output to `sink`.
pub async fn drive_to_sink<St, S, E>(stream: St, sink: S) -> Result<DriveOutcome, HtmsError>
where
    St: Stream<Item = Result<String, HtmsError>>,
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    StreamingSink::new(sink).pipe(stream).await
}
