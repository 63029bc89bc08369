use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{debug, info};

use super::shape::{Element, Shape};
use super::utils::render_cell;
use crate::error::{PipelineError, Result};

/// First-pass dump of the agent output, exactly as written to the working file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirstPassTable {
    /// Column names for record lists; `None` for string lists and matrices.
    pub headers: Option<Vec<String>>,
    /// Each row, as a Vec of Strings (one per field). Rows may be ragged.
    pub rows: Vec<Vec<String>>,
}

impl FirstPassTable {
    /// Lay out a classified shape as a table. No validation happens here.
    ///
    /// Returns `None` for [`Shape::Unrecognized`].
    pub fn from_shape(shape: &Shape) -> Option<Self> {
        match shape {
            Shape::RecordList(elements) => Some(Self::from_records(elements)),
            Shape::StringList(items) => Some(Self {
                headers: None,
                rows: items.iter().map(|v| vec![render_cell(v)]).collect(),
            }),
            Shape::Matrix(rows) => Some(Self {
                headers: None,
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(render_cell).collect())
                    .collect(),
            }),
            Shape::Unrecognized(_) => None,
        }
    }

    fn from_records(elements: &[Element]) -> Self {
        // header: keys of the first record, then keys first seen later on
        let mut headers: Vec<String> = Vec::new();
        for element in elements {
            if let Element::Record(map) = element {
                for key in map.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
        }

        let rows = elements
            .iter()
            .map(|element| match element {
                Element::Record(map) => headers
                    .iter()
                    .map(|h| map.get(h).map(render_cell).unwrap_or_default())
                    .collect(),
                Element::Other(value) => stray_row(value, headers.len()),
            })
            .collect();

        Self {
            headers: Some(headers),
            rows,
        }
    }

    pub fn has_headers(&self) -> bool {
        self.headers.is_some()
    }

    /// Write the table to `path`, replacing any previous working file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut wtr = WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;
        if let Some(headers) = &self.headers {
            wtr.write_record(headers)
                .map_err(|e| PipelineError::csv(path, e))?;
        }
        for row in &self.rows {
            wtr.write_record(row).map_err(|e| PipelineError::csv(path, e))?;
        }
        wtr.flush().map_err(|e| PipelineError::io(path, e))?;

        debug!(path = %path.display(), rows = self.rows.len(), "wrote working table");
        Ok(())
    }

    /// Read a working file back. `has_headers` must match how it was written.
    pub fn read<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;

        let headers = if has_headers {
            let h = rdr.headers().map_err(|e| PipelineError::csv(path, e))?;
            Some(h.iter().map(str::to_string).collect())
        } else {
            None
        };

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| PipelineError::csv(path, e))?;
            debug!(row = idx, fields = record.len(), "read working row");
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }
}

/// Non-record element of a record list: its text goes in the first cell.
fn stray_row(value: &Value, width: usize) -> Vec<String> {
    let mut row = vec![String::new(); width.max(1)];
    row[0] = render_cell(value);
    row
}

/// Primary serializer: dump `shape` to the working file at `path` and hand
/// back the table as persisted.
#[tracing::instrument(level = "info", skip(shape, path), fields(path = %path.as_ref().display()))]
pub fn serialize_first_pass<P: AsRef<Path>>(
    shape: &Shape,
    path: P,
) -> Result<Option<FirstPassTable>> {
    let Some(table) = FirstPassTable::from_shape(shape) else {
        return Ok(None);
    };
    table.write(&path)?;
    let persisted = FirstPassTable::read(&path, table.has_headers())?;
    info!(
        rows = persisted.rows.len(),
        columns = persisted.headers.as_ref().map(Vec::len),
        "first-pass table written"
    );
    Ok(Some(persisted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::shape::{classify, RawAgentOutput, Unrecognized};
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    fn shape_of(value: Value) -> Shape {
        classify(RawAgentOutput::Structured(value)).unwrap()
    }

    #[test]
    fn record_list_header_from_first_record_then_later_keys() {
        let shape = shape_of(json!([
            {"Course": "BCS205", "Room": "A1"},
            {"Room": "B2", "Course": "BCS101", "Section": 3},
            "stray text"
        ]));
        let table = FirstPassTable::from_shape(&shape).unwrap();

        assert_eq!(
            table.headers,
            Some(vec!["Course".to_string(), "Room".into(), "Section".into()])
        );
        assert_eq!(table.rows[0], vec!["BCS205", "A1", ""]);
        assert_eq!(table.rows[1], vec!["BCS101", "B2", "3"]);
        assert_eq!(table.rows[2], vec!["stray text", "", ""]);
    }

    #[test]
    fn string_list_is_single_headerless_column() {
        let shape = shape_of(json!(["one", "two, with comma", 7]));
        let table = FirstPassTable::from_shape(&shape).unwrap();
        assert_eq!(table.headers, None);
        assert_eq!(table.rows, vec![vec!["one"], vec!["two, with comma"], vec!["7"]]);
    }

    #[test]
    fn unrecognized_produces_no_table() {
        assert_eq!(
            FirstPassTable::from_shape(&Shape::Unrecognized(Unrecognized::EmptySequence)),
            None
        );
    }

    #[test]
    fn round_trips_through_working_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("work").join("courses.raw.csv");
        let payload = r#"[{"Course":"BCS205","Course Name":"Data, Structures"}]"#;
        let shape = shape_of(json!([payload, "line one\nline two"]));

        let persisted = serialize_first_pass(&shape, &path)?.unwrap();

        assert_eq!(persisted, FirstPassTable::from_shape(&shape).unwrap());
        assert_eq!(persisted.rows[0][0], payload);
        Ok(())
    }

    #[test]
    fn ragged_matrix_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("courses.raw.csv");
        let shape = shape_of(json!([["Course", "Room"], ["BCS205"], ["BCS101", "A1", "extra"]]));

        let persisted = serialize_first_pass(&shape, &path)?.unwrap();

        assert_eq!(persisted.headers, None);
        assert_eq!(persisted.rows[1], vec!["BCS205"]);
        assert_eq!(persisted.rows[2].len(), 3);
        Ok(())
    }
}
