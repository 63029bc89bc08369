use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::raw_table::FirstPassTable;
use crate::error::{Diagnostic, Diagnostics};

/// `[` then, after optional whitespace, `{`: a serialized array of objects.
static PAYLOAD_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\{").expect("payload signature regex"));

/// Longest `[{ ... }]` span in a cell, across newlines.
static PAYLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("payload regex"));

/// Result of scanning a first-pass table for embedded payloads.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Mappings re-extracted from embedded payloads, with their source row.
    pub records: Vec<(usize, Map<String, Value>)>,
    /// Indices of first-pass rows that carry no payload signature.
    pub passthrough: Vec<usize>,
    pub diagnostics: Diagnostics,
}

/// Scan the first column of every row for an embedded array of objects.
///
/// Purely additive: rows without the signature are listed in
/// [`Recovery::passthrough`] and otherwise left alone.
#[tracing::instrument(level = "info", skip(table), fields(rows = table.rows.len()))]
pub fn recover_embedded(table: &FirstPassTable) -> Recovery {
    let recovery = table
        .rows
        .iter()
        .enumerate()
        .fold(Recovery::default(), |mut acc, (idx, row)| {
            let cell = row.first().map(String::as_str).unwrap_or_default();
            if !PAYLOAD_SIGNATURE.is_match(cell) {
                acc.passthrough.push(idx);
                return acc;
            }

            match extract_payload(cell) {
                Ok(elements) => {
                    debug!(row = idx, elements = elements.len(), "recovered embedded payload");
                    for element in elements {
                        match element {
                            Value::Object(map) => acc.records.push((idx, map)),
                            other => acc.diagnostics.push(Diagnostic::malformed(
                                None,
                                format!("row {idx}: embedded element is not a mapping: {other}"),
                            )),
                        }
                    }
                }
                Err(message) => acc
                    .diagnostics
                    .push(Diagnostic::RecoveryParseFailure { row: idx, message }),
            }
            acc
        });

    info!(
        recovered = recovery.records.len(),
        passthrough = recovery.passthrough.len(),
        failures = recovery.diagnostics.count("recovery_parse_failure"),
        "embedded-structure recovery done"
    );
    recovery
}

fn extract_payload(cell: &str) -> Result<Vec<Value>, String> {
    let span = PAYLOAD
        .find(cell)
        .ok_or_else(|| "payload has no closing `}]`".to_string())?;
    serde_json::from_str::<Vec<Value>>(span.as_str()).map_err(|e| e.to_string())
}
