use std::fs;
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, error};

use crate::error::Result;
use crate::notebook::Notebook;

/// Serialise a notebook the way nbformat does: sorted keys, one-space
/// indentation, multi-line strings as line lists and a trailing newline.
pub fn notebook_to_string(notebook: &Notebook) -> Result<String> {
    let value = serde_json::to_value(notebook).map_err(std::io::Error::other)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;
    buf.push(b'\n');

    String::from_utf8(buf).map_err(|e| std::io::Error::other(e).into())
}

/// Write the notebook to `path`, replacing any existing file atomically.
///
/// An existing file keeps its permissions. A new file gets the mode a plain
/// create would give it (`0o666` minus the umask).
pub fn write_notebook(notebook: &Notebook, path: &Path) -> Result<()> {
    let text = notebook_to_string(notebook)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.flush()?;
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {:?} ({} bytes)", path, text.len());
    Ok(())
}

/// Owns a notebook while it executes and guarantees it reaches disk.
///
/// `commit` writes the document and reports the outcome. A guard dropped
/// without being committed (for instance while unwinding from a panic)
/// still writes, logging rather than returning any failure.
pub struct NotebookGuard {
    notebook: Notebook,
    path: PathBuf,
    committed: bool,
}

impl NotebookGuard {
    pub fn new(notebook: Notebook, path: impl Into<PathBuf>) -> Self {
        Self {
            notebook,
            path: path.into(),
            committed: false,
        }
    }

    pub fn commit(mut self) -> Result<()> {
        self.committed = true;
        write_notebook(&self.notebook, &self.path)
    }
}

impl Deref for NotebookGuard {
    type Target = Notebook;

    fn deref(&self) -> &Notebook {
        &self.notebook
    }
}

impl DerefMut for NotebookGuard {
    fn deref_mut(&mut self) -> &mut Notebook {
        &mut self.notebook
    }
}

impl Drop for NotebookGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = write_notebook(&self.notebook, &self.path) {
            error!("Failed to write {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_notebook;
    use crate::notebook::{Cell, Output};

    fn sample() -> Notebook {
        let mut nb = Notebook::with_cells(vec![Cell::markdown("# Title\n"), Cell::code("print(1)\nprint(2)")]);
        nb.nbformat_minor = 4;
        if let Some(code) = nb.cells[1].as_code_mut() {
            code.execution_count = Some(1);
            code.outputs.push(Output::stream("stdout", "1\n2\n"));
        }
        nb
    }

    #[test]
    fn output_matches_nbformat_layout() {
        let text = notebook_to_string(&sample()).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n \"cells\": ["));
        assert!(text.contains("\"print(1)\\n\",\n    \"print(2)\""));
        // sorted keys: "cells" < "metadata" < "nbformat" < "nbformat_minor"
        let cells = text.find("\"cells\"").unwrap();
        let minor = text.find("\"nbformat_minor\"").unwrap();
        assert!(cells < minor);
    }

    #[test]
    fn written_notebook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.ipynb");
        write_notebook(&sample(), &path).unwrap();
        let back = read_notebook(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn guard_writes_when_dropped_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.ipynb");
        {
            let mut guard = NotebookGuard::new(Notebook::default(), &path);
            guard.cells.push(Cell::code("x = 1"));
        }
        let back = read_notebook(&path).unwrap();
        assert_eq!(back.cells.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        write_notebook(&sample(), &path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_notebook(&sample(), &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn new_files_get_the_default_create_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // a plain create applies the process umask to 0o666
        let reference = dir.path().join("reference");
        fs::write(&reference, "").unwrap();
        let expected = fs::metadata(&reference).unwrap().permissions().mode() & 0o777;

        let path = dir.path().join("new-output.ipynb");
        write_notebook(&sample(), &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, expected);
    }
}
