use std::{io::Write, path::Path};

use tempfile::NamedTempFile;
use tracing::warn;

/// Write `contents` to `path` atomically: callers polling the file never
/// observe a half-written reply.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| {
        warn!(path = %path.display(), error = %e.error, "response persist failed");
        e.error
    })?;
    Ok(())
}
