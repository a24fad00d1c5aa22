//! Serializer: renders tokens and appends task results as chunks.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;

use futures::future::join_all;
use futures::{Stream, StreamExt};
use htms_core::{
    EndTag, HtmsError, PipelinePhase, PipelineTiming, ResolvedWork, ResolverToken, TaskInfo,
    Token, MODULE_ATTRIBUTE, UUID_ATTRIBUTE,
};

use crate::chunk::{
    render_chunk, render_error_chunk, runtime_script, BODY_CLOSE, CLEANUP_SCRIPT, HIDE_EMPTY_STYLE,
    HTML_CLOSE,
};

/// Outcome of one task after every task has settled.
#[derive(Debug)]
pub struct Settled {
    /// The task's marker.
    pub info: TaskInfo,
    /// Specifier used for resolution.
    pub specifier: Option<String>,
    /// Rendered HTML, or the failure message.
    pub outcome: Result<String, String>,
}

/// Run every task concurrently and wait for all of them.
///
/// A failing or panicking task never affects its siblings. Results come
/// back in the order the work was given, whatever order tasks finish in.
/// Tasks run on their own tokio tasks: if the caller stops waiting they
/// keep running and their results are dropped.
pub async fn settle_all(work: Vec<ResolvedWork>) -> Vec<Settled> {
    let (pending, handles): (Vec<_>, Vec<_>) = work
        .into_iter()
        .map(|w| ((w.info, w.specifier), tokio::spawn(w.task.run())))
        .unzip();

    join_all(handles)
        .await
        .into_iter()
        .zip(pending)
        .map(|(joined, (info, specifier))| {
            let outcome = match joined {
                Ok(Ok(html)) => Ok(html),
                Ok(Err(error)) => Err(error.to_string()),
                Err(join_error) if join_error.is_panic() => Err("task panicked".to_string()),
                Err(join_error) => Err(join_error.to_string()),
            };
            Settled {
                info,
                specifier,
                outcome,
            }
        })
        .collect()
}

/// Per-document serializer state.
pub struct Serializer {
    debug: bool,
    seen_end_tags: HashSet<String>,
    work: Vec<ResolvedWork>,
    /// Trim the next plain token once, where a suppressed tag used to be.
    clean_next: bool,
    timing: PipelineTiming,
    phase: PipelinePhase,
}

impl Serializer {
    /// Create a serializer. `debug` exposes error details in failed chunks.
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            seen_end_tags: HashSet::new(),
            work: Vec::new(),
            clean_next: false,
            timing: PipelineTiming::new(),
            phase: PipelinePhase::Start,
        }
    }

    /// Render one item, appending output chunks to `out`.
    pub fn process(&mut self, item: ResolverToken, out: &mut Vec<String>) {
        let token = match item {
            ResolverToken::Task(work) => {
                self.work.push(work);
                return;
            }
            ResolverToken::Token(token) => token,
        };

        match token {
            Token::EndTag(tag) | Token::ModuleScopeEnd { tag, .. } => {
                self.seen_end_tags.insert(tag.name.clone());
                self.render_end_tag(&tag, out);
                self.clean_next = matches!(tag.name.as_str(), "html" | "body");
            }
            Token::TaskMarker { mut tag, task, .. } => {
                tag.remove_attribute(MODULE_ATTRIBUTE);
                tag.push_attribute(UUID_ATTRIBUTE, task.uuid);
                out.push(tag.render());
            }
            Token::ModuleScopeStart { mut tag, .. } => {
                tag.remove_attribute(MODULE_ATTRIBUTE);
                out.push(tag.render());
            }
            other => {
                let html = other.html();
                let html = if self.clean_next { html.trim() } else { html };
                self.clean_next = false;
                push_chunk(out, html.to_string());
            }
        }
    }

    fn render_end_tag(&self, tag: &EndTag, out: &mut Vec<String>) {
        match tag.name.as_str() {
            "html" => {}
            "body" => out.push(runtime_script()),
            "head" => {
                out.push(HIDE_EMPTY_STYLE.to_string());
                push_chunk(out, tag.html.clone());
            }
            _ => push_chunk(out, tag.html.clone()),
        }
    }

    /// Run every buffered task and close the document.
    ///
    /// All closing markup is appended to `out` before a missing-task
    /// failure is reported.
    pub async fn flush(&mut self, out: &mut Vec<String>) -> Result<(), HtmsError> {
        self.phase = PipelinePhase::Flushing;
        self.timing.mark("flush_start");

        let work = std::mem::take(&mut self.work);
        let task_found = !work.is_empty();
        tracing::debug!(tasks = work.len(), "running tasks");

        for settled in settle_all(work).await {
            match settled.outcome {
                Ok(html) => out.push(render_chunk(&settled.info.uuid, &html)),
                Err(message) => {
                    tracing::error!(
                        task = %settled.info.name,
                        uuid = %settled.info.uuid,
                        error = %message,
                        "Unhandled Task Error"
                    );
                    out.push(render_error_chunk(
                        &settled.info,
                        settled.specifier.as_deref(),
                        &message,
                        self.debug,
                    ));
                }
            }
        }
        self.timing.mark("flush_end");

        if self.seen_end_tags.contains("body") {
            out.push(CLEANUP_SCRIPT.to_string());
            out.push(BODY_CLOSE.to_string());
        }
        if self.seen_end_tags.contains("html") {
            out.push(HTML_CLOSE.to_string());
        }

        self.phase = PipelinePhase::Completion;
        tracing::debug!(
            first_chunk_ms = self.timing.time_to_first_chunk().map(|d| d.as_millis() as u64),
            flush_ms = self.timing.flush_duration().map(|d| d.as_millis() as u64),
            total_ms = self.timing.elapsed().as_millis() as u64,
            "document complete"
        );

        if !task_found {
            tracing::warn!("document has no task marker");
            return Err(HtmsError::NoTaskFound);
        }

        Ok(())
    }

    /// Record that a chunk left the serializer.
    pub fn note_emitted(&mut self) {
        if self.phase == PipelinePhase::Start {
            self.phase = PipelinePhase::Streaming;
            self.timing.mark("first_chunk");
        }
    }

    /// Current phase.
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Timing marks for this document.
    pub fn timing(&self) -> &PipelineTiming {
        &self.timing
    }
}

fn push_chunk(out: &mut Vec<String>, chunk: String) {
    if !chunk.is_empty() {
        out.push(chunk);
    }
}

struct SerializeState<S> {
    upstream: Pin<Box<S>>,
    serializer: Serializer,
    queue: VecDeque<String>,
    error: Option<HtmsError>,
    done: bool,
}

/// Serialize resolver output into HTML chunks.
///
/// An upstream failure is forwarded after the chunks already rendered and
/// ends the stream without running tasks. A document without tasks is
/// rendered completely and then ends with `HtmsError::NoTaskFound`.
pub fn serialize<S>(items: S, debug: bool) -> impl Stream<Item = Result<String, HtmsError>>
where
    S: Stream<Item = Result<ResolverToken, HtmsError>>,
{
    let state = SerializeState {
        upstream: Box::pin(items),
        serializer: Serializer::new(debug),
        queue: VecDeque::new(),
        error: None,
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                state.serializer.note_emitted();
                return Some((Ok(chunk), state));
            }
            if let Some(error) = state.error.take() {
                return Some((Err(error), state));
            }
            if state.done {
                return None;
            }

            let mut out = Vec::new();
            match state.upstream.next().await {
                Some(Ok(item)) => state.serializer.process(item, &mut out),
                Some(Err(error)) => {
                    state.error = Some(error);
                    state.done = true;
                }
                None => {
                    if let Err(error) = state.serializer.flush(&mut out).await {
                        state.error = Some(error);
                    }
                    state.done = true;
                }
            }
            state.queue.extend(out);
        }
    })
}
