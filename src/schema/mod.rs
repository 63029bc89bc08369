pub mod types;
pub mod write;

pub use types::{
    CourseCode, CourseCodeError, CourseRecord, NormalizedTable, CANONICAL_COLUMNS, COURSE_COLUMN,
};
pub use write::write_canonical;
