//! Persist a [`ContactReport`] as pretty-printed JSON.
//!
//! The report is written to a temporary file in the destination directory
//! and renamed over the target, so a reader (or a killed run) only ever
//! sees a complete document: either the previous checkpoint or the new one.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ContactsError, Result};
use crate::model::contact::ContactReport;

fn target_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn write_error(path: &Path, source: std::io::Error) -> ContactsError {
    ContactsError::ReportWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Fail early if a report could not be written to `path`.
///
/// Creates (and drops) a temporary file next to the target, the same way
/// [`write_report`] does, and rejects a target that is a directory.
pub fn check_writable(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(write_error(
            path,
            std::io::Error::other("output path is a directory"),
        ));
    }
    tempfile::NamedTempFile::new_in(target_dir(path)).map_err(|e| write_error(path, e))?;
    Ok(())
}

/// Atomically write `report` to `path`.
pub fn write_report(report: &ContactReport, path: &Path) -> Result<()> {
    let write_err = |source: std::io::Error| write_error(path, source);

    let mut tmp = tempfile::NamedTempFile::new_in(target_dir(path)).map_err(write_err)?;

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut out, report).map_err(|e| {
            if e.is_io() {
                write_err(e.into())
            } else {
                ContactsError::Serialize(e)
            }
        })?;
        out.write_all(b"\n").map_err(write_err)?;
        out.flush().map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!(
        path = %path.display(),
        contacts = report.contacts.len(),
        complete = report.complete,
        "Report written"
    );
    Ok(())
}

/// Read a report back (checkpoints, tooling, tests).
pub fn read_report(path: &Path) -> Result<ContactReport> {
    let file = std::fs::File::open(path).map_err(|e| ContactsError::open(path, e))?;
    let report = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(report)
}
