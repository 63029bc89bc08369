use serde_json::{Map, Value};
use tracing::{debug, info};

use super::raw_table::FirstPassTable;
use super::utils::{clean_str, fold_key, render_cell};
use crate::error::{Diagnostic, Diagnostics};
use crate::schema::{CourseRecord, NormalizedTable, CANONICAL_COLUMNS, COURSE_COLUMN};

/// One candidate record: (key, value) pairs in source order.
pub type Fields = Vec<(String, String)>;

#[derive(Debug, Default)]
pub struct Normalized {
    pub table: NormalizedTable,
    pub diagnostics: Diagnostics,
}

/// Fields of a recovered mapping.
pub fn fields_from_map(map: &Map<String, Value>) -> Fields {
    map.iter().map(|(k, v)| (k.clone(), render_cell(v))).collect()
}

/// Fields of an already-normalized record.
pub fn fields_from_record(record: &CourseRecord) -> Fields {
    record
        .fields()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Pick the first-pass rows that already are individual records, tagged
/// with their row index.
///
/// - record lists: every pass-through row, keyed by the header
/// - matrices whose first row names a `Course` column: the following
///   pass-through rows, keyed by that first row
/// - anything else is reported as [`Diagnostic::UnstructuredRow`]
pub fn passthrough_records(
    table: &FirstPassTable,
    passthrough: &[usize],
    diagnostics: &mut Diagnostics,
) -> Vec<(usize, Fields)> {
    let header_row = match &table.headers {
        Some(headers) => Some((headers.as_slice(), None)),
        None => passthrough
            .first()
            .filter(|&&idx| idx == 0)
            .and_then(|_| table.rows.first())
            .filter(|row| row.iter().any(|c| fold_key(c) == fold_key(COURSE_COLUMN)))
            .map(|row| {
                debug!("using first matrix row as header");
                (row.as_slice(), Some(0))
            }),
    };

    let mut out = Vec::new();
    for &idx in passthrough {
        match header_row {
            Some((_, Some(header_idx))) if header_idx == idx => {}
            Some((headers, _)) => {
                let row = &table.rows[idx];
                let fields = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, c)| (h.clone(), c.clone()))
                    .collect();
                out.push((idx, fields));
            }
            None => diagnostics.push(Diagnostic::UnstructuredRow { row: idx }),
        }
    }
    out
}

/// Project every candidate onto [`CANONICAL_COLUMNS`].
///
/// Extra keys are dropped, missing keys become empty cells, and candidates
/// with no `Course` key at all are dropped and reported.
#[tracing::instrument(level = "info", skip(candidates))]
pub fn normalize<I>(candidates: I) -> Normalized
where
    I: IntoIterator<Item = Fields>,
{
    let mut out = Normalized::default();
    for fields in candidates {
        match project(&fields) {
            Some(record) => out.table.records.push(record),
            None => {
                let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
                out.diagnostics.push(Diagnostic::malformed(
                    None,
                    format!("missing {COURSE_COLUMN:?} key (keys: {keys:?})"),
                ));
            }
        }
    }
    info!(
        records = out.table.len(),
        dropped = out.diagnostics.len(),
        "normalized records"
    );
    out
}

fn project(fields: &Fields) -> Option<CourseRecord> {
    let mut cells: [String; 10] = Default::default();
    for (cell, column) in cells.iter_mut().zip(CANONICAL_COLUMNS) {
        if let Some(value) = lookup(fields, column) {
            // only the course code is unquoted; other cells keep agent quoting
            *cell = if column == COURSE_COLUMN {
                clean_str(value)
            } else {
                value.trim().to_string()
            };
        }
    }
    lookup(fields, COURSE_COLUMN)?;
    Some(CourseRecord::from_cells(cells))
}

/// Exact key first, then a folded match (`course_name` → `Course Name`).
fn lookup<'a>(fields: &'a Fields, column: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == column)
        .or_else(|| {
            let folded = fold_key(column);
            fields.iter().find(|(k, _)| fold_key(k) == folded)
        })
        .map(|(_, v)| v.as_str())
}
