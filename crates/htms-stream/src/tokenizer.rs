//! Incremental HTML tokenizer with task and module-scope detection.
//!
//! Input may be split anywhere, including inside tags, comments and UTF-8
//! sequences. Incomplete constructs wait in the buffer until more input
//! arrives. Every token keeps the exact source markup so untouched nodes
//! re-render byte for byte, and attribute values are kept as written.

use std::collections::VecDeque;
use std::ops::Range;
use std::pin::Pin;
use std::sync::mpsc::{self, Receiver, Sender};

use futures::{Stream, StreamExt};
use htms_core::{
    Attribute, EndTag, HtmsError, SourceLocation, StartTag, TaskInfo, Token, UnclosedTag,
    MODULE_ATTRIBUTE, TASK_ATTRIBUTE,
};
use lol_html::errors::RewritingError;
use lol_html::html_content::EndTag as EndTagContent;
use lol_html::send::{HtmlRewriter, Settings};
use lol_html::{doc_comments, doc_text, doctype, element, HandlerResult};

/// Source of per-marker task ids.
pub type IdGenerator = Box<dyn FnMut() -> String + Send>;

/// Random UUID v4 ids.
pub fn uuid_generator() -> IdGenerator {
    Box::new(|| uuid::Uuid::new_v4().to_string())
}

/// Deterministic ids: `prefix-0000`, `prefix-0001`, ...
pub fn sequential_id_generator(prefix: impl Into<String>) -> IdGenerator {
    let prefix = prefix.into();
    let mut next = 0usize;
    Box::new(move || {
        let id = format!("{}-{:04}", prefix, next);
        next += 1;
        id
    })
}

/// Whether an element never has content or an end tag.
pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Markup reported by the rewriter, by absolute byte range.
#[derive(Debug)]
enum Event {
    Start {
        range: Range<usize>,
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    End {
        range: Range<usize>,
    },
    /// Text, comments and doctypes, kept verbatim.
    Text {
        range: Range<usize>,
    },
}

impl Event {
    fn range(&self) -> Range<usize> {
        match self {
            Self::Start { range, .. } | Self::End { range } | Self::Text { range } => range.clone(),
        }
    }
}

type Rewriter = HtmlRewriter<'static, fn(&[u8])>;

fn discard_output(_: &[u8]) {}

/// Build a rewriter that reports every tag and text run over `events`.
///
/// Output is discarded; tokens are cut from the source buffer by range.
fn rewriter(events: Sender<Event>) -> Rewriter {
    let elements = events.clone();
    let texts = events.clone();
    let comments = events.clone();
    let doctypes = events;

    let settings = Settings {
        element_content_handlers: vec![element!("*", move |el: &mut lol_html::send::Element<'_, '_>| {
            let attributes = el
                .attributes()
                .iter()
                .map(|a| Attribute::new(a.name(), a.value()))
                .collect();
            elements.send(Event::Start {
                range: el.source_location().bytes(),
                name: el.tag_name(),
                attributes,
                self_closing: el.is_self_closing(),
            })?;

            if el.can_have_content() {
                let ends = elements.clone();
                el.on_end_tag(Box::new(move |end: &mut EndTagContent<'_>| -> HandlerResult {
                    ends.send(Event::End {
                        range: end.source_location().bytes(),
                    })?;
                    Ok(())
                }))?;
            }
            Ok(())
        })],
        document_content_handlers: vec![
            doc_text!(move |text| {
                texts.send(Event::Text {
                    range: text.source_location().bytes(),
                })?;
                Ok(())
            }),
            doc_comments!(move |comment| {
                comments.send(Event::Text {
                    range: comment.source_location().bytes(),
                })?;
                Ok(())
            }),
            doctype!(move |doctype| {
                doctypes.send(Event::Text {
                    range: doctype.source_location().bytes(),
                })?;
                Ok(())
            }),
        ],
        strict: false,
        ..Settings::new_send()
    };

    HtmlRewriter::new(settings, discard_output as fn(&[u8]))
}

/// Length of a complete end tag at the start of `input`, with its name.
fn end_tag_at(input: &str) -> Option<(usize, String)> {
    let rest = input.strip_prefix("</")?;
    if !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let len = rest.find('>')? + 3;
    let name = rest
        .split(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    Some((len, name))
}

/// Start of the next end-tag-like sequence in `input`, after position 0.
fn next_end_tag(input: &str) -> usize {
    let bytes = input.as_bytes();
    (1..bytes.len())
        .find(|&i| {
            bytes[i] == b'<'
                && bytes.get(i + 1) == Some(&b'/')
                && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic)
        })
        .unwrap_or(input.len())
}

fn markup_error(error: RewritingError) -> HtmsError {
    HtmsError::Markup(error.to_string())
}

/// An element waiting for its end tag.
#[derive(Debug)]
struct OpenElement {
    name: String,
    location: SourceLocation,
    /// Set when the element opened a module scope.
    scope: Option<String>,
}

/// Incremental tokenizer for one document.
///
/// Bytes go through `lol_html`, which tracks raw text elements, comments
/// and quoting across chunk boundaries. Its handlers report byte ranges;
/// the source text of each range becomes a token. End tags that close
/// nothing get no handler call, so they show up as gaps between ranges.
pub struct Tokenizer {
    rewriter: Option<Rewriter>,
    events: Receiver<Event>,
    /// Source text from byte `start` on, not yet turned into tokens.
    buffer: String,
    start: usize,
    undecoded: Vec<u8>,
    decoded_bytes: usize,
    line: usize,
    col: usize,
    offset: usize,
    open_elements: Vec<OpenElement>,
    scopes: Vec<String>,
    next_id: IdGenerator,
    markers: usize,
}

impl Tokenizer {
    /// Create a tokenizer generating UUID v4 task ids.
    pub fn new() -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            rewriter: Some(rewriter(sender)),
            events,
            buffer: String::new(),
            start: 0,
            undecoded: Vec::new(),
            decoded_bytes: 0,
            line: 1,
            col: 1,
            offset: 0,
            open_elements: Vec::new(),
            scopes: Vec::new(),
            next_id: uuid_generator(),
            markers: 0,
        }
    }

    /// Use a custom task id source.
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.next_id = generator;
        self
    }

    /// Number of task markers seen so far.
    pub fn markers(&self) -> usize {
        self.markers
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open_elements.len()
    }

    /// Feed a chunk of bytes, appending complete tokens to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<Token>) -> Result<(), HtmsError> {
        let from = self.buffer.len();
        self.decode(chunk)?;

        let Some(rewriter) = self.rewriter.as_mut() else {
            return Err(HtmsError::Markup("input after end of document".to_string()));
        };
        if let Err(error) = rewriter.write(&self.buffer.as_bytes()[from..]) {
            self.rewriter = None;
            return Err(markup_error(error));
        }

        let result = self.drain_events(out);
        self.compact();
        result
    }

    /// Feed a chunk of text, appending complete tokens to `out`.
    pub fn feed_str(&mut self, chunk: &str, out: &mut Vec<Token>) -> Result<(), HtmsError> {
        self.feed(chunk.as_bytes(), out)
    }

    /// Signal end of input, flushing buffered text and checking that every
    /// element was closed.
    pub fn finish(&mut self, out: &mut Vec<Token>) -> Result<(), HtmsError> {
        if !self.undecoded.is_empty() {
            return Err(HtmsError::InvalidUtf8 {
                offset: self.decoded_bytes,
            });
        }

        if let Some(rewriter) = self.rewriter.take() {
            rewriter.end().map_err(markup_error)?;
        }
        self.drain_events(out)?;
        self.take_gap(self.start + self.buffer.len(), out)?;
        self.compact();

        tracing::debug!(markers = self.markers, "tokenizer reached end of input");

        if !self.open_elements.is_empty() {
            let unclosed = self
                .open_elements
                .drain(..)
                .map(|e| UnclosedTag {
                    name: e.name,
                    location: e.location,
                })
                .collect();
            return Err(HtmsError::MissingCloseTags(unclosed));
        }

        Ok(())
    }

    fn decode(&mut self, chunk: &[u8]) -> Result<(), HtmsError> {
        self.undecoded.extend_from_slice(chunk);

        let valid = match std::str::from_utf8(&self.undecoded) {
            Ok(_) => self.undecoded.len(),
            Err(e) if e.error_len().is_some() => {
                return Err(HtmsError::InvalidUtf8 {
                    offset: self.decoded_bytes + e.valid_up_to(),
                })
            }
            // Truncated sequence at the end of the chunk.
            Err(e) => e.valid_up_to(),
        };

        self.buffer
            .push_str(&String::from_utf8_lossy(&self.undecoded[..valid]));
        self.undecoded.drain(..valid);
        self.decoded_bytes += valid;
        Ok(())
    }

    fn drain_events(&mut self, out: &mut Vec<Token>) -> Result<(), HtmsError> {
        while let Ok(event) = self.events.try_recv() {
            let range = event.range();
            // An end tag closing several elements is reported once per element.
            if range.is_empty() || range.end <= self.offset {
                continue;
            }

            self.take_gap(range.start, out)?;
            let location = self.location();
            let html = self.take(range.end);

            match event {
                Event::Start {
                    name,
                    attributes,
                    self_closing,
                    ..
                } => self.on_start_tag(
                    StartTag {
                        name,
                        attributes,
                        self_closing,
                        location,
                        html,
                    },
                    out,
                ),
                Event::End { .. } => {
                    let name = end_tag_at(&html).map(|(_, name)| name).unwrap_or_default();
                    self.on_end_tag(name, location, html, out)?;
                }
                Event::Text { .. } => push_text(out, html),
            }
        }

        Ok(())
    }

    /// Turn unreported source before `end` into end tags and text.
    fn take_gap(&mut self, end: usize, out: &mut Vec<Token>) -> Result<(), HtmsError> {
        while self.offset < end {
            let local = self.offset - self.start;
            let Some(gap) = self.buffer.get(local..end - self.start) else {
                break;
            };

            match end_tag_at(gap) {
                Some((len, name)) => {
                    let location = self.location();
                    let html = self.take(self.offset + len);
                    self.on_end_tag(name, location, html, out)?;
                }
                None => {
                    let len = next_end_tag(gap);
                    let html = self.take(self.offset + len);
                    push_text(out, html);
                }
            }
        }

        Ok(())
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.col, self.offset)
    }

    /// Consume source up to absolute byte `end`.
    fn take(&mut self, end: usize) -> String {
        let from = self.offset - self.start;
        let mut to = (end - self.start).min(self.buffer.len());
        while !self.buffer.is_char_boundary(to) {
            to -= 1;
        }
        let html = self.buffer[from..to.max(from)].to_string();

        for c in html.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.offset += html.len();
        html
    }

    fn compact(&mut self) {
        self.buffer.drain(..self.offset - self.start);
        self.start = self.offset;
    }

    fn on_start_tag(&mut self, tag: StartTag, out: &mut Vec<Token>) {
        let has_content = !tag.self_closing && !is_void_element(&tag.name);

        let task_name = tag.attribute(TASK_ATTRIBUTE).filter(|v| !v.is_empty());
        let module = tag.attribute(MODULE_ATTRIBUTE).filter(|v| !v.is_empty());

        if let Some(name) = task_name {
            let task = TaskInfo::new(name, (self.next_id)());
            let specifier = module
                .map(str::to_string)
                .or_else(|| self.scopes.last().cloned());
            self.markers += 1;

            tracing::trace!(
                task = %task.name,
                uuid = %task.uuid,
                specifier = specifier.as_deref().unwrap_or(""),
                "task marker"
            );

            if has_content {
                self.open(&tag, None);
            }
            out.push(Token::TaskMarker {
                tag,
                task,
                specifier,
            });
            return;
        }

        if let Some(specifier) = module.map(str::to_string) {
            if has_content {
                self.scopes.push(specifier.clone());
                self.open(&tag, Some(specifier.clone()));
                out.push(Token::ModuleScopeStart { tag, specifier });
            } else {
                // A scope with no content closes where it opens.
                let end = EndTag {
                    name: tag.name.clone(),
                    location: tag.location,
                    html: String::new(),
                };
                out.push(Token::ModuleScopeStart {
                    tag,
                    specifier: specifier.clone(),
                });
                out.push(Token::ModuleScopeEnd {
                    tag: end,
                    specifier,
                });
            }
            return;
        }

        if has_content {
            self.open(&tag, None);
        }
        out.push(Token::StartTag(tag));
    }

    fn open(&mut self, tag: &StartTag, scope: Option<String>) {
        self.open_elements.push(OpenElement {
            name: tag.name.clone(),
            location: tag.location,
            scope,
        });
    }

    fn on_end_tag(
        &mut self,
        name: String,
        location: SourceLocation,
        html: String,
        out: &mut Vec<Token>,
    ) -> Result<(), HtmsError> {
        let Some(open) = self.open_elements.pop() else {
            return Err(HtmsError::MissingOpenTag { html, location });
        };

        if open.name != name {
            return Err(HtmsError::MismatchedCloseTag {
                expected: open.name,
                got: html,
                location,
            });
        }

        let tag = EndTag {
            name,
            location,
            html,
        };

        match open.scope {
            Some(specifier) => {
                self.scopes.pop();
                out.push(Token::ModuleScopeEnd { tag, specifier });
            }
            None => out.push(Token::EndTag(tag)),
        }

        Ok(())
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_text(out: &mut Vec<Token>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::RawText(previous)) = out.last_mut() {
        previous.push_str(&text);
    } else {
        out.push(Token::RawText(text));
    }
}

/// Tokenize a complete document held in memory.
pub fn tokenize_str(input: &str, tokenizer: Tokenizer) -> Result<Vec<Token>, HtmsError> {
    let mut tokenizer = tokenizer;
    let mut out = Vec::new();
    tokenizer.feed_str(input, &mut out)?;
    tokenizer.finish(&mut out)?;
    Ok(out)
}

struct TokenizeState<S> {
    input: Pin<Box<S>>,
    tokenizer: Tokenizer,
    queue: VecDeque<Token>,
    error: Option<HtmsError>,
    done: bool,
}

/// Tokenize a stream of chunks.
///
/// Tokens are yielded in source order as soon as they are complete. A
/// structural error is yielded after every token that preceded it and ends
/// the stream.
pub fn tokenize<S, B, E>(input: S, tokenizer: Tokenizer) -> impl Stream<Item = Result<Token, HtmsError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<HtmsError>,
{
    let state = TokenizeState {
        input: Box::pin(input),
        tokenizer,
        queue: VecDeque::new(),
        error: None,
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.queue.pop_front() {
                return Some((Ok(token), state));
            }
            if let Some(error) = state.error.take() {
                state.done = true;
                return Some((Err(error), state));
            }
            if state.done {
                return None;
            }

            let mut out = Vec::new();
            let result = match state.input.next().await {
                Some(Ok(chunk)) => state.tokenizer.feed(chunk.as_ref(), &mut out),
                Some(Err(error)) => Err(error.into()),
                None => {
                    state.done = true;
                    state.tokenizer.finish(&mut out)
                }
            };

            state.queue.extend(out);
            if let Err(error) = result {
                state.error = Some(error);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize_str(input, Tokenizer::new().with_id_generator(sequential_id_generator("uuid")))
            .unwrap()
    }

    fn chunked(chunks: &[&str]) -> Result<Vec<Token>, HtmsError> {
        let mut tokenizer = Tokenizer::new().with_id_generator(sequential_id_generator("uuid"));
        let mut out = Vec::new();
        for chunk in chunks {
            tokenizer.feed_str(chunk, &mut out)?;
        }
        tokenizer.finish(&mut out)?;
        Ok(out)
    }

    fn html_of(tokens: &[Token]) -> String {
        tokens.iter().map(Token::html).collect()
    }

    #[test]
    fn test_simple_document() {
        let t = tokens("<div>Hello</div>");
        assert_eq!(t.len(), 3);

        let Token::StartTag(start) = &t[0] else {
            panic!("expected start tag, got {:?}", t[0]);
        };
        assert_eq!(start.name, "div");
        assert_eq!(start.html, "<div>");
        assert_eq!(t[1], Token::RawText("Hello".to_string()));

        let Token::EndTag(end) = &t[2] else {
            panic!("expected end tag, got {:?}", t[2]);
        };
        assert_eq!(end.name, "div");
        assert_eq!(end.html, "</div>");
    }

    #[test]
    fn test_task_marker() {
        let t = tokens(r#"<div data-htms="taskNameTest">...</div>"#);
        assert_eq!(t.len(), 3);

        let Token::TaskMarker { tag, task, specifier } = &t[0] else {
            panic!("expected task marker, got {:?}", t[0]);
        };
        assert_eq!(tag.html, r#"<div data-htms="taskNameTest">"#);
        assert_eq!(task.name, "taskNameTest");
        assert_eq!(task.uuid, "uuid-0000");
        assert_eq!(specifier, &None);
        assert!(matches!(&t[2], Token::EndTag(end) if end.name == "div"));
    }

    #[test]
    fn test_task_marker_with_module() {
        let t = tokens(r#"<div data-htms="taskNameTest" data-htms-module="../path/to/module.js">...</div>"#);

        let Token::TaskMarker { specifier, .. } = &t[0] else {
            panic!("expected task marker, got {:?}", t[0]);
        };
        assert_eq!(specifier.as_deref(), Some("../path/to/module.js"));
        // A marker never opens a scope of its own.
        assert!(matches!(&t[2], Token::EndTag(_)));
    }

    #[test]
    fn test_module_scope() {
        let t = tokens(r#"<div data-htms-module="../path/to/module-only.js">...</div>"#);
        assert_eq!(t.len(), 3);
        assert!(matches!(
            &t[0],
            Token::ModuleScopeStart { specifier, .. } if specifier == "../path/to/module-only.js"
        ));
        assert!(matches!(
            &t[2],
            Token::ModuleScopeEnd { specifier, tag } if specifier == "../path/to/module-only.js" && tag.html == "</div>"
        ));
    }

    #[test]
    fn test_nested_scopes_resolve_to_nearest() {
        let html = r#"<main data-htms-module="root-module.js">
  <div data-htms="taskA"></div>
  <div data-htms="taskA" data-htms-module="child-module.js"></div>
  <section data-htms-module="child-module.js">
    <div data-htms="taskA"></div>
    <div data-htms="taskA" data-htms-module="root-module.js"></div>
  </section>
  <div data-htms="taskB"></div>
  <div data-htms="taskB" data-htms-module="child-module.js"></div>
</main>"#;

        let summary: Vec<(String, String)> = tokens(html)
            .into_iter()
            .filter_map(|t| match t {
                Token::TaskMarker { task, specifier, .. } => {
                    Some((task.name, specifier.unwrap_or_default()))
                }
                Token::ModuleScopeStart { specifier, .. } => Some(("start".into(), specifier)),
                Token::ModuleScopeEnd { specifier, .. } => Some(("end".into(), specifier)),
                _ => None,
            })
            .collect();

        let expected = [
            ("start", "root-module.js"),
            ("taskA", "root-module.js"),
            ("taskA", "child-module.js"),
            ("start", "child-module.js"),
            ("taskA", "child-module.js"),
            ("taskA", "root-module.js"),
            ("end", "child-module.js"),
            ("taskB", "root-module.js"),
            ("taskB", "child-module.js"),
            ("end", "root-module.js"),
        ];
        let expected: Vec<(String, String)> = expected
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(summary, expected);
    }

    #[test]
    fn test_missing_close_tag() {
        let err = tokenize_str(r#"<div data-htms-module="x">"#, Tokenizer::new()).unwrap_err();
        let HtmsError::MissingCloseTags(unclosed) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(unclosed.len(), 1);
        assert_eq!(unclosed[0].name, "div");
        assert_eq!(unclosed[0].location.to_string(), "[1:1]");
        assert!(err.to_string().starts_with("Missing close tag(s): 1"));
    }

    #[test]
    fn test_missing_open_tag() {
        let err = tokenize_str("<span>hello</span></span>", Tokenizer::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing open tag: '</span>' at [1:19]");
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = tokenize_str("<span>hello</div>", Tokenizer::new()).unwrap_err();
        let HtmsError::MismatchedCloseTag { expected, got, location } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(expected, "span");
        assert_eq!(got, "</div>");
        assert_eq!((location.line, location.col), (1, 12));
    }

    #[test]
    fn test_tokens_before_error_are_kept() {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        tokenizer.feed_str("<p>a</p></div>", &mut out).unwrap();
        let result = tokenizer.finish(&mut out);
        assert!(matches!(result, Err(HtmsError::MissingOpenTag { .. })));
        assert_eq!(html_of(&out), "<p>a</p>");
    }

    #[test]
    fn test_stray_end_tag_before_later_markup() {
        let err = chunked(&["<main><p>a</p></div>", "<p>b</p></main>"]).unwrap_err();
        let HtmsError::MismatchedCloseTag { expected, got, location } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(expected, "main");
        assert_eq!(got, "</div>");
        assert_eq!(location.offset, 14);
    }

    #[test]
    fn test_locations_span_lines() {
        let t = tokens("<html>\n  <body>\n  </body>\n</html>");
        let body = t.iter().find_map(|t| match t {
            Token::StartTag(tag) if tag.name == "body" => Some(tag.location),
            _ => None,
        });
        assert_eq!(body.map(|l| (l.line, l.col)), Some((2, 3)));
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let t = tokens(r#"<head><meta charset="UTF-8" /><link rel="x"><br></head>"#);
        assert_eq!(html_of(&t), r#"<head><meta charset="UTF-8" /><link rel="x"><br></head>"#);

        let meta = t[1].start_tag().unwrap();
        assert!(meta.self_closing);
        let link = t[2].start_tag().unwrap();
        assert!(!link.self_closing);
    }

    #[test]
    fn test_comments_and_doctype_are_raw() {
        let html = "<!doctype html>\n<!-- <div> -->\n<p>x</p>";
        let t = tokens(html);
        assert_eq!(t[0], Token::RawText("<!doctype html>\n<!-- <div> -->\n".to_string()));
        assert_eq!(html_of(&t), html);
    }

    #[test]
    fn test_script_content_is_text() {
        let html = "<script>if (a < b) { x = '</div>'; }</script>";
        let t = tokens(html);
        assert_eq!(t.len(), 3);
        assert_eq!(t[1], Token::RawText("if (a < b) { x = '</div>'; }".to_string()));
    }

    #[test]
    fn test_split_anywhere() {
        let html = r#"<!doctype html><div class="a b" data-htms="news">loading…<!-- c --></div><script>x<y</script>"#;
        let whole = tokens(html);

        for split in 1..html.len() {
            if !html.is_char_boundary(split) {
                continue;
            }
            let parts = chunked(&[&html[..split], &html[split..]]).unwrap();
            assert_eq!(html_of(&parts), html, "split at {}", split);
            assert_eq!(
                parts.iter().filter(|t| t.is_task_marker()).count(),
                1,
                "split at {}",
                split
            );
            let starts: Vec<_> = parts.iter().filter_map(Token::start_tag).cloned().collect();
            let expected: Vec<_> = whole.iter().filter_map(Token::start_tag).cloned().collect();
            assert_eq!(starts, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_split_utf8_sequence() {
        let bytes = "<p>é</p>".as_bytes();
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        tokenizer.feed(&bytes[..4], &mut out).unwrap();
        tokenizer.feed(&bytes[4..], &mut out).unwrap();
        tokenizer.finish(&mut out).unwrap();
        assert_eq!(html_of(&out), "<p>é</p>");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        let err = tokenizer.feed(b"<p>\xff</p>", &mut out).unwrap_err();
        assert!(matches!(err, HtmsError::InvalidUtf8 { offset: 3 }));
    }

    #[test]
    fn test_attribute_parsing() {
        let t = tokens(r#"<input type=text disabled value='a &amp; b' data-x = "1" data-x="2"/>"#);
        let tag = t[0].start_tag().unwrap();
        let attrs: Vec<(&str, &str)> = tag
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(
            attrs,
            vec![
                ("type", "text"),
                ("disabled", ""),
                ("value", "a &amp; b"),
                ("data-x", "1"),
                ("data-x", "2"),
            ]
        );
        assert!(tag.self_closing);
    }

    #[test]
    fn test_rendered_tag_tokenizes_the_same() {
        let sources = [
            r#"<input type=text disabled value='a &amp; b' data-x = "1" data-x="2"/>"#,
            "<A HREF='/x?a=1&amp;b=2' title=\"caf\u{e9}\u{a0}\"></a>",
            "<br>",
        ];

        for source in sources {
            let first = tokens(source)[0].start_tag().unwrap().clone();
            let again = tokens(&first.render())[0].start_tag().unwrap().clone();

            assert_eq!(again.name, first.name);
            assert_eq!(again.attributes, first.attributes);
            assert_eq!(again.self_closing, first.self_closing);
        }
    }

    #[test]
    fn test_names_are_lowercased() {
        let t = tokens(r#"<DIV Data-Htms="Task"></div>"#);
        let Token::TaskMarker { tag, task, .. } = &t[0] else {
            panic!("expected task marker, got {:?}", t[0]);
        };
        assert_eq!(tag.name, "div");
        assert_eq!(task.name, "Task");
    }

    #[test]
    fn test_empty_marker_values_are_ignored() {
        let t = tokens(r#"<div data-htms="" data-htms-module="">x</div>"#);
        assert!(matches!(&t[0], Token::StartTag(_)));
    }

    #[test]
    fn test_self_closing_module_scope() {
        let t = tokens(r#"<div data-htms-module="m"/><p data-htms="a"></p>"#);
        assert!(matches!(&t[0], Token::ModuleScopeStart { .. }));
        assert!(matches!(&t[1], Token::ModuleScopeEnd { tag, .. } if tag.html.is_empty()));
        assert!(matches!(&t[2], Token::TaskMarker { specifier: None, .. }));
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let t = tokens("<p>1 < 2</p>");
        assert_eq!(t[1], Token::RawText("1 < 2".to_string()));
    }

    #[test]
    fn test_character_references_are_kept() {
        let html = r#"<p data-htms="x" title="&copy; 2024 &hellip;" alt='say "hi"'>&amp;</p>"#;
        let t = tokens(html);
        let tag = t[0].start_tag().unwrap();
        assert_eq!(tag.attribute("title"), Some("&copy; 2024 &hellip;"));
        assert_eq!(
            tag.render(),
            r#"<p data-htms="x" title="&copy; 2024 &hellip;" alt="say &quot;hi&quot;">"#
        );
        assert_eq!(t[1], Token::RawText("&amp;".to_string()));
        assert_eq!(html_of(&t), html);
    }

    #[test]
    fn test_script_text_streams_before_close() {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        tokenizer.feed_str("<script><x", &mut out).unwrap();
        let body = "a".repeat(1 << 20);
        for part in body.as_bytes().chunks(64 * 1024) {
            tokenizer.feed(part, &mut out).unwrap();
        }

        let text: usize = out
            .iter()
            .filter_map(|t| match t {
                Token::RawText(text) => Some(text.len()),
                _ => None,
            })
            .sum();
        assert!(text >= body.len() - 64 * 1024, "only {} bytes of text emitted", text);
        assert!(tokenizer.buffer.len() < 64 * 1024);

        tokenizer.feed_str("</script>", &mut out).unwrap();
        tokenizer.finish(&mut out).unwrap();
        assert!(matches!(out.last(), Some(Token::EndTag(end)) if end.name == "script"));
    }

    #[test]
    fn test_sequential_ids() {
        let mut next = sequential_id_generator("id");
        assert_eq!(next(), "id-0000");
        assert_eq!(next(), "id-0001");
    }

    #[tokio::test]
    async fn test_stream_yields_tokens_then_error() {
        let chunks: Vec<Result<&str, std::io::Error>> = vec![Ok("<div>a"), Ok("</div></p>")];
        let results: Vec<_> = tokenize(futures::stream::iter(chunks), Tokenizer::new())
            .collect()
            .await;

        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(matches!(
            results[3],
            Err(HtmsError::MissingOpenTag { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_input_error() {
        let chunks: Vec<Result<&str, std::io::Error>> = vec![
            Ok("<div>"),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
        ];
        let results: Vec<_> = tokenize(futures::stream::iter(chunks), Tokenizer::new())
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert!(matches!(&results[1], Err(HtmsError::Input(msg)) if msg.contains("disk gone")));
    }
}
