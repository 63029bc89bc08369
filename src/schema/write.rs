use csv::WriterBuilder;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use super::{NormalizedTable, CANONICAL_COLUMNS};
use crate::error::{PipelineError, Result};

/// Write `table` to `path` as the canonical course file.
///
/// - header row is always [`CANONICAL_COLUMNS`], even for an empty table
/// - rows keep table order
/// - the previous file at `path` is replaced only once the new one is
///   completely written
pub fn write_canonical<P: AsRef<Path>>(path: P, table: &NormalizedTable) -> Result<()> {
    let path = path.as_ref();

    // 1) Make sure the parent exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }

    // 2) Write to a hidden sibling tmp file
    let tmp_path = tmp_path_for(path);
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)
        .map_err(|e| PipelineError::csv(&tmp_path, e))?;

    wtr.write_record(CANONICAL_COLUMNS)
        .map_err(|e| PipelineError::csv(&tmp_path, e))?;
    for record in table.iter() {
        wtr.write_record(record.cells())
            .map_err(|e| PipelineError::csv(&tmp_path, e))?;
    }
    wtr.flush().map_err(|e| PipelineError::io(&tmp_path, e))?;
    drop(wtr);

    // 3) Rename over the canonical file
    fs::rename(&tmp_path, path).map_err(|e| PipelineError::io(path, e))?;

    info!(path = %path.display(), rows = table.len(), "wrote canonical table");
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "courses.csv".into());
    path.with_file_name(format!(".{}.tmp", name))
}
