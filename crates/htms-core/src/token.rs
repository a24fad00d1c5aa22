//! Typed markup tokens.

use std::fmt;

use crate::task::TaskInfo;

/// Position of a tag's `<` in the source document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number in characters, starting at 1.
    pub col: usize,
    /// Byte offset from the start of the document.
    pub offset: usize,
}

impl SourceLocation {
    /// Create a location from line and column.
    pub fn new(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, offset }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.line, self.col)
    }
}

/// A single `name="value"` pair on a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Value as written, character references included (empty for bare
    /// attributes).
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An opening tag as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in source order, duplicates preserved.
    pub attributes: Vec<Attribute>,
    /// Whether the tag was written with a trailing `/>`.
    pub self_closing: bool,
    /// Where the tag starts.
    pub location: SourceLocation,
    /// Original markup, byte for byte.
    pub html: String,
}

impl StartTag {
    /// Get the first attribute value with the given name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Append an attribute.
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push(Attribute::new(name, value));
    }

    /// Remove every attribute with the given name.
    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|a| a.name != name);
    }

    /// Render the tag from its name and attributes.
    ///
    /// Unlike `html`, this reflects any attribute changes made after
    /// tokenization. Values are always double-quoted; character
    /// references in them are written back unchanged.
    pub fn render(&self) -> String {
        let mut output = format!("<{}", self.name);

        for attribute in &self.attributes {
            output.push(' ');
            output.push_str(&attribute.name);
            output.push_str("=\"");
            output.push_str(&escape_attribute(&attribute.value));
            output.push('"');
        }

        output.push_str(if self.self_closing { "/>" } else { ">" });
        output
    }
}

/// A closing tag as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag {
    /// Lowercased tag name.
    pub name: String,
    /// Where the tag starts.
    pub location: SourceLocation,
    /// Original markup, byte for byte.
    pub html: String,
}

/// A tag that was opened but never closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclosedTag {
    /// Tag name.
    pub name: String,
    /// Where the tag was opened.
    pub location: SourceLocation,
}

impl fmt::Display for UnclosedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- <{}> opened at {}", self.name, self.location)
    }
}

/// A markup event produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Plain opening tag.
    StartTag(StartTag),
    /// Plain closing tag.
    EndTag(EndTag),
    /// Text, comments, doctype and anything else passed through verbatim.
    RawText(String),
    /// Placeholder element carrying `data-htms`.
    TaskMarker {
        tag: StartTag,
        task: TaskInfo,
        /// Explicit `data-htms-module`, else the nearest enclosing scope.
        specifier: Option<String>,
    },
    /// Element opening a module scope with `data-htms-module`.
    ModuleScopeStart { tag: StartTag, specifier: String },
    /// Closing tag of a module scope element.
    ModuleScopeEnd { tag: EndTag, specifier: String },
}

impl Token {
    /// Original markup of the token.
    pub fn html(&self) -> &str {
        match self {
            Self::StartTag(tag)
            | Self::TaskMarker { tag, .. }
            | Self::ModuleScopeStart { tag, .. } => &tag.html,
            Self::EndTag(tag) | Self::ModuleScopeEnd { tag, .. } => &tag.html,
            Self::RawText(content) => content,
        }
    }

    /// Opening tag of the token, if it has one.
    pub fn start_tag(&self) -> Option<&StartTag> {
        match self {
            Self::StartTag(tag)
            | Self::TaskMarker { tag, .. }
            | Self::ModuleScopeStart { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Closing tag of the token, if it has one.
    pub fn end_tag(&self) -> Option<&EndTag> {
        match self {
            Self::EndTag(tag) | Self::ModuleScopeEnd { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Whether this token is a task marker.
    pub fn is_task_marker(&self) -> bool {
        matches!(self, Self::TaskMarker { .. })
    }
}

/// Quote a source attribute value for double-quoted output.
///
/// Values are still markup, so `&` is left alone and only `"` needs a
/// reference.
pub fn escape_attribute(value: &str) -> String {
    value.replace('"', "&quot;")
}

/// Escape text content for HTML output.
pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
