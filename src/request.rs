// src/request.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::{fmt, str::FromStr};

static TERM_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(SP|SU\s*1|SU\s*2|FA)\s+(\d{4})-(\d{2})$").expect("term label regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("year of study must be a single digit 1-9, got {0:?}")]
    YearOfStudy(String),

    #[error("unknown semester label {0:?} (expected e.g. \"SP 2024-25\", \"SU 1 2024-25\", \"FA 2025-26\")")]
    Semester(String),

    #[error("{0} must not be empty")]
    EmptyCredential(&'static str),
}

/// Requested year of study, 1 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct YearOfStudy(u8);

impl YearOfStudy {
    pub fn new(year: u8) -> Option<Self> {
        (1..=9).contains(&year).then_some(Self(year))
    }

    /// Year denoted by a single ASCII digit, `'0'` excluded.
    pub fn from_digit(c: char) -> Option<Self> {
        c.to_digit(10).and_then(|d| Self::new(d as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl FromStr for YearOfStudy {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_digit(c).ok_or_else(|| RequestError::YearOfStudy(s.into())),
            _ => Err(RequestError::YearOfStudy(s.into())),
        }
    }
}

impl fmt::Display for YearOfStudy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Spring,
    Summer1,
    Summer2,
    Fall,
}

impl Term {
    pub fn code(&self) -> &'static str {
        match self {
            Term::Spring => "SP",
            Term::Summer1 => "SU 1",
            Term::Summer2 => "SU 2",
            Term::Fall => "FA",
        }
    }
}

/// Portal term label such as `FA 2025-26`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semester {
    pub term: Term,
    /// First calendar year of the academic year.
    pub start_year: u16,
}

impl FromStr for Semester {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RequestError::Semester(s.into());
        let caps = TERM_LABEL.captures(s.trim()).ok_or_else(err)?;

        let term = match caps[1].split_whitespace().collect::<String>().as_str() {
            "SP" => Term::Spring,
            "SU1" => Term::Summer1,
            "SU2" => Term::Summer2,
            "FA" => Term::Fall,
            _ => return Err(err()),
        };
        let start_year: u16 = caps[2].parse().map_err(|_| err())?;
        let end_suffix: u16 = caps[3].parse().map_err(|_| err())?;
        if (start_year + 1) % 100 != end_suffix {
            return Err(err());
        }

        Ok(Semester { term, start_year })
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{:02}",
            self.term.code(),
            self.start_year,
            (self.start_year + 1) % 100
        )
    }
}

/// Opaque credential. Never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// One validated scrape request, built once at the process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub username: Secret,
    pub password: Secret,
    pub semester: Semester,
    pub year_of_study: YearOfStudy,
}

impl ScrapeRequest {
    pub fn parse(
        username: &str,
        password: &str,
        semester: &str,
        year_of_study: &str,
    ) -> Result<Self, RequestError> {
        if username.is_empty() {
            return Err(RequestError::EmptyCredential("username"));
        }
        if password.is_empty() {
            return Err(RequestError::EmptyCredential("password"));
        }
        Ok(Self {
            username: Secret::new(username),
            password: Secret::new(password),
            semester: semester.parse()?,
            year_of_study: year_of_study.parse()?,
        })
    }
}
