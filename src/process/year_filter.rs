use tracing::{debug, info};

use crate::error::{Diagnostic, Diagnostics};
use crate::request::YearOfStudy;
use crate::schema::{CourseCode, CourseCodeError, NormalizedTable};

#[derive(Debug, Default)]
pub struct Filtered {
    pub table: NormalizedTable,
    /// Well-formed records for another year.
    pub excluded: usize,
    pub diagnostics: Diagnostics,
}

/// Year of study encoded in a course code (`BCS205` → 2).
pub fn course_year(course: &str) -> Result<YearOfStudy, CourseCodeError> {
    CourseCode::parse(course).map(|code| code.year)
}

/// Keep the records whose course code denotes `year`.
///
/// Applied whatever the agent claims to have filtered already. Records with
/// a malformed course code are dropped and reported, never kept.
#[tracing::instrument(level = "info", skip(table), fields(records = table.len()))]
pub fn filter_by_year(table: NormalizedTable, year: YearOfStudy) -> Filtered {
    let mut out = Filtered::default();
    for record in table.records {
        match course_year(record.course()) {
            Ok(y) if y == year => out.table.records.push(record),
            Ok(y) => {
                debug!(course = record.course(), year = %y, "other year, excluded");
                out.excluded += 1;
            }
            Err(e) => out
                .diagnostics
                .push(Diagnostic::malformed(Some(record.course()), e.to_string())),
        }
    }
    info!(
        kept = out.table.len(),
        excluded = out.excluded,
        malformed = out.diagnostics.len(),
        "year-of-study filter applied"
    );
    out
}
