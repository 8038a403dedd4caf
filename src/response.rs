//! Recovery of a JSON object from free-form model output.
//!
//! Model replies wrap their structured payload in many ways: a markdown
//! fence, a completion marker followed by the object, or a bare object in
//! the middle of prose. Three strategies are tried in order and the first
//! one that parses wins. Finding nothing means the model has not finished,
//! which is not an error.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Token a model emits once it is ready to hand over the build plan.
pub const DEFAULT_MARKER: &str = "READY_TO_BUILD";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap());
static BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fenced,
    Marker,
    Bare,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub strategy: Strategy,
}

/// Scanner state while walking an object candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InString,
    Escaped,
}

impl ScanState {
    fn step(self, c: char) -> ScanState {
        match (self, c) {
            (ScanState::Outside, '"') => ScanState::InString,
            (ScanState::Outside, _) => ScanState::Outside,
            (ScanState::InString, '\\') => ScanState::Escaped,
            (ScanState::InString, '"') => ScanState::Outside,
            (ScanState::InString, _) => ScanState::InString,
            (ScanState::Escaped, _) => ScanState::InString,
        }
    }
}

/// Byte range of the first balanced `{...}` in `text`. Braces inside string
/// literals are ignored; a backslash inside a string consumes the next char.
pub fn balanced_object_span(text: &str) -> Option<Range<usize>> {
    let start = text.find('{')?;
    let mut state = ScanState::Outside;
    let mut depth = 0usize;

    for (offset, c) in text[start..].char_indices() {
        if state == ScanState::Outside {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(start..start + offset + 1);
                    }
                }
                _ => {}
            }
        }
        state = state.step(c);
    }
    None
}

#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    marker: String,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        ResponseExtractor::new(DEFAULT_MARKER)
    }
}

impl ResponseExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        ResponseExtractor {
            marker: marker.into(),
        }
    }

    /// Try fenced block, then text after the marker, then the greedy bare
    /// span. `None` means "structure not ready".
    pub fn extract(&self, text: &str) -> Option<Recovered> {
        let attempts: [(Strategy, fn(&Self, &str) -> Option<Value>); 3] = [
            (Strategy::Fenced, Self::from_fence),
            (Strategy::Marker, Self::from_marker),
            (Strategy::Bare, Self::from_bare),
        ];
        for (strategy, attempt) in attempts {
            if let Some(value) = attempt(self, text) {
                debug!(?strategy, "recovered structured response");
                return Some(Recovered { value, strategy });
            }
        }
        debug!(len = text.len(), "no structured response in model text yet");
        None
    }

    /// Like [`extract`](Self::extract) but reports absence as
    /// [`Error::ParseFailure`] for callers that propagate with `?`.
    pub fn extract_value(&self, text: &str) -> Result<Value> {
        self.extract(text)
            .map(|r| r.value)
            .ok_or(Error::ParseFailure)
    }

    pub fn contains_marker(&self, text: &str) -> bool {
        text.contains(&self.marker)
    }

    fn from_fence(&self, text: &str) -> Option<Value> {
        let caps = FENCE_RE.captures(text)?;
        parse_object(caps.get(1)?.as_str().trim())
    }

    fn from_marker(&self, text: &str) -> Option<Value> {
        let idx = text.find(&self.marker)?;
        let after = &text[idx + self.marker.len()..];
        let span = balanced_object_span(after)?;
        parse_object(&after[span])
    }

    fn from_bare(&self, text: &str) -> Option<Value> {
        let m = BARE_RE.find(text)?;
        parse_object(m.as_str())
    }
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

/// Convenience wrapper using the default marker.
pub fn extract_structured(text: &str) -> Option<Value> {
    ResponseExtractor::default().extract(text).map(|r| r.value)
}
