use std::fmt;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const BUFFER_NAME: &str = "edit buffer";

/// The document shown on start up and restored by `reset`.
pub fn default_document() -> Value {
    serde_json::json!({
        "action": "openProductImage",
        "url": "https://dummyjson.com/products/1",
        "authorized": true,
        "request_id": "a1b2-c3d4-e5f6"
    })
}

/// Two-space indented JSON, the form used for the edit buffer and for
/// displaying JSON responses.
pub fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Applied,
    Valid,
    Cleared,
    Restored,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Applied => write!(f, "JSON applied successfully."),
            Notice::Valid => write!(f, "JSON is valid."),
            Notice::Cleared => write!(f, "Editor cleared."),
            Notice::Restored => write!(f, "Example restored."),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum EditorError {
    #[error("Nothing to apply.")]
    NothingToApply,

    #[error("Editor is empty.")]
    EditorEmpty,

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidJson(#[from] InvalidJson),
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid JSON: {message}")]
pub struct InvalidJson {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("parser stopped here")]
    span: Option<SourceSpan>,
}

impl InvalidJson {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Option<SourceSpan> {
        self.span
    }
}

/// Holds the current document together with its editable text.
///
/// The two only meet in [`Editor::apply`]: editing the text never touches
/// the document, and the document is replaced only by text that parsed.
#[derive(Debug, Clone)]
pub struct Editor {
    document: Value,
    text: String,
    source_name: String,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        let document = default_document();
        let text = to_pretty(&document);

        Self {
            document,
            text,
            source_name: BUFFER_NAME.into(),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.source_name = BUFFER_NAME.into();
    }

    /// Replaces the buffer with text read from somewhere else, keeping the
    /// origin so parse errors point at it.
    pub fn load_text(&mut self, source_name: impl Into<String>, text: impl Into<String>) {
        self.text = text.into();
        self.source_name = source_name.into();
    }

    pub fn apply(&mut self) -> Result<Notice, EditorError> {
        if self.text.trim().is_empty() {
            return Err(EditorError::NothingToApply);
        }

        self.document = parse(&self.text, &self.source_name)?;
        Ok(Notice::Applied)
    }

    pub fn validate(&self) -> Result<Notice, EditorError> {
        if self.text.trim().is_empty() {
            return Err(EditorError::EditorEmpty);
        }

        parse(&self.text, &self.source_name)?;
        Ok(Notice::Valid)
    }

    pub fn clear(&mut self) -> Notice {
        self.text.clear();
        self.source_name = BUFFER_NAME.into();
        Notice::Cleared
    }

    pub fn reset(&mut self) -> Notice {
        *self = Self::new();
        Notice::Restored
    }
}

// Numbers keep their literal text and nesting depth is only bounded by the
// heap; serde_stacker grows the stack as the parser recurses.
fn parse(text: &str, source_name: &str) -> Result<Value, InvalidJson> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();

    let parsed = Value::deserialize(serde_stacker::Deserializer::new(&mut de))
        .and_then(|value| de.end().map(|()| value));

    parsed.map_err(|err| InvalidJson {
        message: err.to_string(),
        src: NamedSource::new(source_name, text.to_string()),
        span: error_span(text, err.line(), err.column()),
    })
}

// serde_json reports 1-based line and column, with the column counted in bytes.
fn error_span(text: &str, line: usize, column: usize) -> Option<SourceSpan> {
    if line == 0 {
        return None;
    }

    let line_start: usize = text.split_inclusive('\n').take(line - 1).map(str::len).sum();
    let mut offset = (line_start + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }

    let len = text[offset..].chars().next().map_or(0, char::len_utf8);
    Some(SourceSpan::new(offset.into(), len))
}
