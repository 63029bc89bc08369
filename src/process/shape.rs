//! Shape classification of raw agent output.
//!
//! The agent may hand back a JSON array of objects, an array of strings (often
//! with the real payload embedded in one of them), an array of arrays, or
//! plain text that encodes any of these. The classifier decides once which of
//! these it is; every later stage matches on [`Shape`].

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::utils::strip_code_fence;
use crate::error::{PipelineError, Result};

/// Untrusted content returned by the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAgentOutput {
    Text(String),
    Structured(Value),
}

/// Classified agent output.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Sequence of mappings. Elements that are not mappings are kept as
    /// [`Element::Other`] so the recoverer still sees them.
    RecordList(Vec<Element>),
    /// Sequence of scalars, each rendered as text.
    StringList(Vec<Value>),
    /// Sequence of sequences.
    Matrix(Vec<Vec<Value>>),
    Unrecognized(Unrecognized),
}

/// One element of a record list.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Record(Map<String, Value>),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unrecognized {
    EmptySequence,
    Scalar(&'static str),
    Mapping { keys: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    RecordList,
    StringList,
    Matrix,
    Unrecognized,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::RecordList(_) => ShapeKind::RecordList,
            Shape::StringList(_) => ShapeKind::StringList,
            Shape::Matrix(_) => ShapeKind::Matrix,
            Shape::Unrecognized(_) => ShapeKind::Unrecognized,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Shape::RecordList(v) => v.len(),
            Shape::StringList(v) => v.len(),
            Shape::Matrix(v) => v.len(),
            Shape::Unrecognized(_) => 0,
        }
    }
}

impl std::fmt::Display for Unrecognized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unrecognized::EmptySequence => f.write_str("empty sequence"),
            Unrecognized::Scalar(kind) => write!(f, "single {kind} value"),
            Unrecognized::Mapping { keys } => write!(f, "single mapping with {keys} keys"),
        }
    }
}

/// Maximum number of times a JSON string is unwrapped and re-parsed.
const MAX_TEXT_NESTING: usize = 2;

/// Classify raw agent output. Fails only when text does not parse as JSON.
#[tracing::instrument(level = "info", skip(raw))]
pub fn classify(raw: RawAgentOutput) -> Result<Shape> {
    let value = match raw {
        RawAgentOutput::Text(text) => parse_text(&text, 0)?,
        RawAgentOutput::Structured(Value::String(text)) => parse_text(&text, 0)?,
        RawAgentOutput::Structured(value) => value,
    };
    let shape = classify_value(value);
    info!(shape = ?shape.kind(), elements = shape.len(), "classified agent output");
    Ok(shape)
}

fn parse_text(text: &str, depth: usize) -> Result<Value> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(80).collect();
        PipelineError::extraction(format!("{e} (content starts with {preview:?})"))
    })?;

    match value {
        Value::String(inner) if depth < MAX_TEXT_NESTING => match parse_text(&inner, depth + 1) {
            Ok(value) => {
                debug!("agent output was a JSON string, parsed its contents");
                Ok(value)
            }
            Err(_) => Ok(Value::String(inner)),
        },
        other => Ok(other),
    }
}

fn classify_value(value: Value) -> Shape {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let keys = map.len();
            match unwrap_envelope(map) {
                Some(items) => items,
                None => return Shape::Unrecognized(Unrecognized::Mapping { keys }),
            }
        }
        other => return Shape::Unrecognized(Unrecognized::Scalar(scalar_kind(&other))),
    };

    match items.first() {
        None => Shape::Unrecognized(Unrecognized::EmptySequence),
        Some(Value::Object(_)) => Shape::RecordList(
            items
                .into_iter()
                .map(|v| match v {
                    Value::Object(map) => Element::Record(map),
                    other => Element::Other(other),
                })
                .collect(),
        ),
        Some(Value::Array(_)) => Shape::Matrix(
            items
                .into_iter()
                .map(|v| match v {
                    Value::Array(row) => row,
                    other => vec![other],
                })
                .collect(),
        ),
        Some(_) => Shape::StringList(items),
    }
}

/// `{"courses": [...]}` → `[...]`.
fn unwrap_envelope(map: Map<String, Value>) -> Option<Vec<Value>> {
    if map.len() != 1 {
        return None;
    }
    match map.into_iter().next()? {
        (key, Value::Array(items)) => {
            debug!(key = %key, "unwrapped single-key envelope");
            Some(items)
        }
        _ => None,
    }
}

fn scalar_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
