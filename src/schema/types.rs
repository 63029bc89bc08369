// src/schema/types.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::request::YearOfStudy;

/// Canonical column set, in output order. Downstream readers depend on it.
pub const CANONICAL_COLUMNS: [&str; 10] = [
    "Course",
    "Course Name",
    "Instructor",
    "Room",
    "Days",
    "Credits",
    "Start Time",
    "End Time",
    "Max Enrollment",
    "Total Enrollment",
];

pub const COURSE_COLUMN: &str = "Course";

static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("course code regex"));

/// Parsed `<prefix letters><3 digits>` course code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCode<'a> {
    pub prefix: &'a str,
    pub number: &'a str,
    pub year: YearOfStudy,
}

/// Why a course code was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseCodeError {
    #[error("course code is empty")]
    Empty,
    #[error("course code does not match <letters><digits>")]
    Pattern,
    #[error("numeric suffix must be exactly 3 digits")]
    SuffixLength,
    #[error("year digit must be 1-9")]
    Year,
}

impl<'a> CourseCode<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, CourseCodeError> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(CourseCodeError::Empty);
        }
        let caps = COURSE_CODE.captures(code).ok_or(CourseCodeError::Pattern)?;
        let (prefix, number) = match (caps.get(1), caps.get(2)) {
            (Some(p), Some(n)) => (p.as_str(), n.as_str()),
            _ => return Err(CourseCodeError::Pattern),
        };
        if number.len() != 3 {
            return Err(CourseCodeError::SuffixLength);
        }
        let year = number
            .chars()
            .next()
            .and_then(YearOfStudy::from_digit)
            .ok_or(CourseCodeError::Year)?;
        Ok(Self {
            prefix,
            number,
            year,
        })
    }
}

/// One course offering projected onto [`CANONICAL_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CourseRecord {
    cells: [String; 10],
}

impl CourseRecord {
    pub fn from_cells(cells: [String; 10]) -> Self {
        Self { cells }
    }

    pub fn course(&self) -> &str {
        &self.cells[0]
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        CANONICAL_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.cells[i].as_str())
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Column/value pairs in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        CANONICAL_COLUMNS
            .iter()
            .copied()
            .zip(self.cells.iter().map(String::as_str))
    }
}

impl Serialize for CourseRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CANONICAL_COLUMNS.len()))?;
        for (k, v) in self.fields() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Ordered course records; row order is extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct NormalizedTable {
    pub records: Vec<CourseRecord>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.records.iter()
    }
}

impl FromIterator<CourseRecord> for NormalizedTable {
    fn from_iter<I: IntoIterator<Item = CourseRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
