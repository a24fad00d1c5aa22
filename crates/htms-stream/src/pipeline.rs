//! Pipeline composition and input helpers.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use htms_core::{HtmsError, PipelineConfig, ResolutionPolicy, Resolver};
use tokio::io::AsyncReadExt;

use crate::resolver::resolve_tokens;
use crate::serializer::serialize;
use crate::tokenizer::{tokenize, IdGenerator, Tokenizer};

/// Read size used by [`file_stream`].
pub const FILE_CHUNK_SIZE: usize = 16 * 1024;

/// Output of a composed pipeline.
pub type HtmsStream = BoxStream<'static, Result<String, HtmsError>>;

/// Builder for a document pipeline.
pub struct PipelineBuilder {
    config: PipelineConfig,
    id_generator: Option<IdGenerator>,
}

impl PipelineBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            id_generator: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Show error details in failed chunks.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set how resolution failures are handled.
    pub fn with_resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Use a custom placeholder id source instead of random uuids.
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Compose tokenizer, resolver stage and serializer over `input`.
    pub fn build<S, B, E>(self, input: S, resolver: Arc<dyn Resolver>) -> HtmsStream
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<HtmsError> + Send + 'static,
    {
        let tokenizer = match self.id_generator {
            Some(generator) => Tokenizer::new().with_id_generator(generator),
            None => Tokenizer::new(),
        };

        let tokens = tokenize(input, tokenizer);
        let resolved = resolve_tokens(tokens, resolver, self.config.resolution);
        serialize(resolved, self.config.debug).boxed()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compose the three stages over `input`.
///
/// Each call builds a fresh, independent pipeline.
pub fn create_pipeline<S, B, E>(
    input: S,
    resolver: Arc<dyn Resolver>,
    config: &PipelineConfig,
) -> HtmsStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<HtmsError> + Send + 'static,
{
    PipelineBuilder::new()
        .with_config(config.clone())
        .build(input, resolver)
}

/// A single-chunk input.
pub fn string_stream(
    input: impl Into<String>,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    futures::stream::iter(std::iter::once(Ok(input.into())))
}

/// An input made of the given chunks, in order.
pub fn chunk_stream<I>(chunks: I) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    futures::stream::iter(chunks.into_iter().map(Ok))
}

enum FileState {
    Unopened(PathBuf),
    Reading(tokio::fs::File),
    Done,
}

/// Read a file as a stream of byte chunks.
///
/// The file is opened on first poll; an open failure is the first item.
pub fn file_stream(
    path: impl AsRef<Path>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let state = FileState::Unopened(path.as_ref().to_path_buf());

    futures::stream::unfold(state, |state| async move {
        let mut file = match state {
            FileState::Done => return None,
            FileState::Reading(file) => file,
            FileState::Unopened(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => return Some((Err(e), FileState::Done)),
            },
        };

        let mut buf = vec![0u8; FILE_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), FileState::Reading(file)))
            }
            Err(e) => Some((Err(e), FileState::Done)),
        }
    })
}

/// A fully collected document.
#[derive(Debug, Default)]
pub struct Rendered {
    /// Every chunk emitted before the stream ended.
    pub html: String,
    /// The failure that ended the stream, if any.
    pub error: Option<HtmsError>,
}

impl Rendered {
    /// Whether the stream ended without a hard failure.
    pub fn is_complete(&self) -> bool {
        self.error.as_ref().map_or(true, HtmsError::is_advisory)
    }
}

/// Collect a pipeline's output into one string.
pub async fn collect_output<S>(stream: S) -> Rendered
where
    S: Stream<Item = Result<String, HtmsError>>,
{
    futures::pin_mut!(stream);
    let mut rendered = Rendered::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => rendered.html.push_str(&chunk),
            Err(error) => {
                rendered.error = Some(error);
                break;
            }
        }
    }

    rendered
}

/// Run a whole document held in memory through a fresh pipeline.
pub async fn render_to_string(
    html: &str,
    resolver: Arc<dyn Resolver>,
    config: &PipelineConfig,
) -> Rendered {
    collect_output(create_pipeline(string_stream(html), resolver, config)).await
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use htms_core::{BoxError, Resolution, Task, TaskInfo};

    use super::*;
    use crate::tokenizer::sequential_id_generator;

    struct Echo;

    #[async_trait::async_trait]
    impl Resolver for Echo {
        async fn resolve(&self, info: &TaskInfo, _specifier: Option<&str>) -> Result<Resolution, BoxError> {
            Ok(Task::ready(format!("<b>{}</b>", info.name)).into())
        }
    }

    #[tokio::test]
    async fn test_file_stream_reads_everything() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = "x".repeat(FILE_CHUNK_SIZE + 10);
        file.write_all(content.as_bytes()).unwrap();

        let chunks: Vec<Vec<u8>> = file_stream(file.path())
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), content.as_bytes());
    }

    #[tokio::test]
    async fn test_file_stream_missing_file() {
        let items: Vec<_> = file_stream("/definitely/not/here.html").collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_chunked_input_matches_whole() {
        let html = r#"<div><p data-htms="a">...</p><p data-htms="b">...</p></div>"#;
        let build = || PipelineBuilder::new().with_id_generator(sequential_id_generator("id"));

        let whole = collect_output(build().build(string_stream(html), Arc::new(Echo))).await;
        let chunks: Vec<String> = html.chars().map(String::from).collect();
        let split = collect_output(build().build(chunk_stream(chunks), Arc::new(Echo))).await;

        assert!(whole.error.is_none());
        assert_eq!(whole.html, split.html);
        assert!(whole.html.contains("<htms-chunk uuid=\"id-0001\"><b>b</b></htms-chunk>"));
    }

    #[tokio::test]
    async fn test_render_to_string_no_task() {
        let rendered = render_to_string("<p>plain</p>", Arc::new(Echo), &PipelineConfig::new()).await;
        assert_eq!(rendered.html, "<p>plain</p>");
        assert!(matches!(rendered.error, Some(HtmsError::NoTaskFound)));
        assert!(rendered.is_complete());
    }
}
