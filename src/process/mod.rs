// src/process/mod.rs
//! Raw agent output → canonical course table.
//!
//! classify → first-pass dump → embedded recovery → normalize → year filter
//! → canonical write. Fatal errors surface before the canonical file is
//! touched; everything else is collected in the run's [`Diagnostics`].

pub mod normalize;
pub mod raw_table;
pub mod recover;
pub mod shape;
pub mod utils;
pub mod year_filter;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::info;

use crate::error::{Diagnostic, Diagnostics, Result};
use crate::request::YearOfStudy;
use crate::schema::{write_canonical, NormalizedTable};
use normalize::{fields_from_map, normalize, passthrough_records, Fields};
use raw_table::serialize_first_pass;
use recover::recover_embedded;
use shape::{classify, RawAgentOutput, Shape, ShapeKind, Unrecognized};
use year_filter::filter_by_year;

/// Where a run writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Canonical course table read by downstream tools.
    pub canonical: PathBuf,
    /// First-pass dump of the agent output.
    pub working: PathBuf,
}

/// Summary of one run, printed for the front end.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub shape: ShapeKind,
    pub year_of_study: YearOfStudy,
    pub elements: usize,
    pub first_pass_rows: usize,
    pub recovered: usize,
    pub normalized: usize,
    pub excluded_other_year: usize,
    pub written: usize,
    /// Canonical file written by this run, if any.
    pub output: Option<PathBuf>,
    pub warnings: BTreeMap<&'static str, usize>,
    pub diagnostics: Diagnostics,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(shape: ShapeKind, elements: usize, year_of_study: YearOfStudy) -> Self {
        Self {
            shape,
            year_of_study,
            elements,
            first_pass_rows: 0,
            recovered: 0,
            normalized: 0,
            excluded_other_year: 0,
            written: 0,
            output: None,
            warnings: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
            finished_at: Utc::now(),
        }
    }

    fn finish(mut self, diagnostics: Diagnostics) -> Self {
        self.warnings = diagnostics.counts();
        self.diagnostics = diagnostics;
        self.finished_at = Utc::now();
        self
    }
}

/// Run every stage on `raw` and write the canonical table for `year`.
#[tracing::instrument(level = "info", skip(raw, paths), fields(canonical = %paths.canonical.display()))]
pub fn run_pipeline(
    raw: RawAgentOutput,
    year: YearOfStudy,
    paths: &OutputPaths,
) -> Result<RunReport> {
    let mut diagnostics = Diagnostics::new();

    // ─── 1) classify ─────────────────────────────────────────────────
    let shape = classify(raw)?;
    let mut report = RunReport::new(shape.kind(), shape.len(), year);

    if let Shape::Unrecognized(what) = &shape {
        if *what == Unrecognized::EmptySequence {
            diagnostics.push(Diagnostic::EmptyResult {
                context: "agent returned an empty sequence".into(),
            });
            write_canonical(&paths.canonical, &NormalizedTable::default())?;
            report.output = Some(paths.canonical.clone());
        } else {
            diagnostics.push(Diagnostic::UnrecognizedShape {
                description: what.to_string(),
            });
            info!("nothing written for unrecognized output");
        }
        return Ok(report.finish(diagnostics));
    }

    // ─── 2) first-pass dump ──────────────────────────────────────────
    let Some(first_pass) = serialize_first_pass(&shape, &paths.working)? else {
        return Ok(report.finish(diagnostics));
    };
    report.first_pass_rows = first_pass.rows.len();

    // ─── 3) recover embedded payloads ────────────────────────────────
    let recovery = recover_embedded(&first_pass);
    report.recovered = recovery.records.len();
    diagnostics.extend(recovery.diagnostics);

    // ─── 4) normalize, in first-pass row order ───────────────────────
    let mut candidates: Vec<(usize, Fields)> =
        passthrough_records(&first_pass, &recovery.passthrough, &mut diagnostics);
    candidates.extend(
        recovery
            .records
            .iter()
            .map(|(row, map)| (*row, fields_from_map(map))),
    );
    candidates.sort_by_key(|(row, _)| *row);

    let normalized = normalize(candidates.into_iter().map(|(_, fields)| fields));
    report.normalized = normalized.table.len();
    diagnostics.extend(normalized.diagnostics);

    // ─── 5) year-of-study filter ─────────────────────────────────────
    let filtered = filter_by_year(normalized.table, year);
    report.excluded_other_year = filtered.excluded;
    diagnostics.extend(filtered.diagnostics);

    if filtered.table.is_empty() {
        diagnostics.push(Diagnostic::EmptyResult {
            context: format!("no courses for year of study {year}"),
        });
    }

    // ─── 6) canonical write ──────────────────────────────────────────
    write_canonical(&paths.canonical, &filtered.table)?;
    report.written = filtered.table.len();
    report.output = Some(paths.canonical.clone());

    info!(
        written = report.written,
        warnings = diagnostics.len(),
        "pipeline finished"
    );
    Ok(report.finish(diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::schema::CANONICAL_COLUMNS;
    use crate::test_support::init_test_logging;
    use anyhow::Result;
    use serde_json::json;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn paths(dir: &Path) -> OutputPaths {
        OutputPaths {
            canonical: dir.join("courses.csv"),
            working: dir.join("courses.raw.csv"),
        }
    }

    fn year(n: u8) -> YearOfStudy {
        YearOfStudy::new(n).unwrap()
    }

    fn read_courses(path: &Path) -> Result<Vec<String>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        assert_eq!(headers, CANONICAL_COLUMNS);
        let mut out = Vec::new();
        for rec in rdr.records() {
            out.push(rec?[0].to_string());
        }
        Ok(out)
    }

    #[test]
    fn record_list_is_filtered_to_requested_year() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let raw = RawAgentOutput::Structured(json!([
            {"Course": "BCS205", "Course Name": "Data Structures", "Credits": 3},
            {"Course": "BCS101", "Course Name": "Intro"},
            {"Course": "XYZ", "Course Name": "Broken"},
            {"Course Name": "No code"},
            {"Course": "MTH210", "Instructor": "Dr. B", "Section": "A"}
        ]));

        let report = run_pipeline(raw, year(2), &paths(dir.path()))?;

        assert_eq!(read_courses(&dir.path().join("courses.csv"))?, vec!["BCS205", "MTH210"]);
        assert_eq!(report.shape, ShapeKind::RecordList);
        // "No code" still has a (blank) Course cell from the header, so the
        // filter is what drops it
        assert_eq!(report.normalized, 5);
        assert_eq!(report.excluded_other_year, 1);
        assert_eq!(report.written, 2);
        assert_eq!(report.warnings.get("malformed_record"), Some(&2));
        Ok(())
    }

    #[test]
    fn string_list_with_embedded_payload_is_recovered() -> Result<()> {
        let dir = tempdir()?;
        let payload = json!([
            {"Course": "BCS311", "Course Name": "Networks", "Room": "R2"},
            {"Course": "BCS205", "Course Name": "Data Structures, II", "Room": "R1"}
        ]);
        let raw = RawAgentOutput::Structured(json!([
            "Navigated to Course Offerings",
            format!("📄 Extracted from page\n```json\n{payload:#}\n```"),
            "[{\"Course\": \"BCS399\""
        ]));

        let report = run_pipeline(raw, year(3), &paths(dir.path()))?;

        assert_eq!(read_courses(&dir.path().join("courses.csv"))?, vec!["BCS311"]);
        assert_eq!(report.recovered, 2);
        assert_eq!(report.warnings.get("unstructured_row"), Some(&1));
        assert_eq!(report.warnings.get("recovery_parse_failure"), Some(&1));
        assert!(dir.path().join("courses.raw.csv").exists());
        Ok(())
    }

    #[test]
    fn recovered_and_passthrough_rows_keep_extraction_order() -> Result<()> {
        let dir = tempdir()?;
        let raw = RawAgentOutput::Structured(json!([
            {"Course": "BCS201"},
            {"Course": "[{\"Course\": \"BCS202\"}, {\"Course\": \"BCS203\"}]"},
            {"Course": "BCS204"}
        ]));

        run_pipeline(raw, year(2), &paths(dir.path()))?;

        assert_eq!(
            read_courses(&dir.path().join("courses.csv"))?,
            vec!["BCS201", "BCS202", "BCS203", "BCS204"]
        );
        Ok(())
    }

    #[test]
    fn empty_sequence_writes_header_only() -> Result<()> {
        let dir = tempdir()?;
        let report = run_pipeline(RawAgentOutput::Text("[]".into()), year(1), &paths(dir.path()))?;

        assert!(read_courses(&dir.path().join("courses.csv"))?.is_empty());
        assert_eq!(report.warnings.get("empty_result"), Some(&1));
        assert_eq!(report.output, Some(dir.path().join("courses.csv")));
        Ok(())
    }

    #[test]
    fn no_matching_courses_still_writes_header() -> Result<()> {
        let dir = tempdir()?;
        let raw = RawAgentOutput::Text(r#"[{"Course": "BCS101"}]"#.into());

        let report = run_pipeline(raw, year(4), &paths(dir.path()))?;

        assert!(read_courses(&dir.path().join("courses.csv"))?.is_empty());
        assert_eq!(report.warnings.get("empty_result"), Some(&1));
        assert_eq!(report.excluded_other_year, 1);
        Ok(())
    }

    #[test]
    fn unparsable_text_aborts_without_touching_files() -> Result<()> {
        let dir = tempdir()?;
        let p = paths(dir.path());
        fs::write(&p.canonical, "previous\n")?;

        let err = run_pipeline(RawAgentOutput::Text("not json".into()), year(2), &p).unwrap_err();

        assert!(matches!(err, PipelineError::Extraction { .. }));
        assert_eq!(fs::read_to_string(&p.canonical)?, "previous\n");
        assert!(!p.working.exists());
        Ok(())
    }

    #[test]
    fn unrecognized_shape_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let p = paths(dir.path());

        let report = run_pipeline(RawAgentOutput::Text("\"Login failed\"".into()), year(2), &p)?;
        assert_eq!(report.shape, ShapeKind::Unrecognized);
        assert_eq!(report.output, None);
        assert!(!p.canonical.exists());

        let report = run_pipeline(RawAgentOutput::Structured(json!(42)), year(2), &p)?;
        assert_eq!(report.shape, ShapeKind::Unrecognized);
        assert_eq!(report.warnings.get("unrecognized_shape"), Some(&1));
        assert_eq!(report.output, None);
        assert!(!p.canonical.exists());
        assert!(!p.working.exists());
        Ok(())
    }

    #[test]
    fn matrix_with_header_row() -> Result<()> {
        let dir = tempdir()?;
        let raw = RawAgentOutput::Structured(json!([
            ["Course", "Course Name", "Room"],
            ["BCS101", "Intro", "R1"],
            ["BCS102", "Discrete Maths", "R2"],
            ["BCS201", "Algorithms", "R3"]
        ]));

        let report = run_pipeline(raw, year(1), &paths(dir.path()))?;

        assert_eq!(report.shape, ShapeKind::Matrix);
        assert_eq!(read_courses(&dir.path().join("courses.csv"))?, vec!["BCS101", "BCS102"]);
        Ok(())
    }

    #[test]
    fn report_serializes_for_front_end() -> Result<()> {
        let dir = tempdir()?;
        let raw = RawAgentOutput::Text(r#"[{"Course": "BCS205"}, {"Course": "XYZ"}]"#.into());

        let report = run_pipeline(raw, year(2), &paths(dir.path()))?;
        let json = serde_json::to_value(&report)?;

        assert_eq!(json["shape"], "record_list");
        assert_eq!(json["year_of_study"], 2);
        assert_eq!(json["written"], 1);
        assert_eq!(json["warnings"]["malformed_record"], 1);
        assert_eq!(json["diagnostics"][0]["kind"], "malformed_record");
        Ok(())
    }
}
