use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::notebook::{NBFORMAT_MAJOR, Notebook};

/// Read and validate an nbformat v4 notebook from disk.
pub fn read_notebook(path: &Path) -> Result<Notebook> {
    let text = fs::read_to_string(path)?;
    let notebook = parse_notebook(&text, path)?;
    debug!(
        "Loaded {:?}: nbformat {}.{}, {} cells",
        path,
        notebook.nbformat,
        notebook.nbformat_minor,
        notebook.cells.len()
    );
    Ok(notebook)
}

/// Parse notebook JSON. `path` is only used to label errors.
pub fn parse_notebook(text: &str, path: &Path) -> Result<Notebook> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::parse(path, e))?;

    let major = value
        .get("nbformat")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::parse(path, "missing nbformat version"))?;
    if major != u64::from(NBFORMAT_MAJOR) {
        return Err(Error::parse(
            path,
            format!("unsupported nbformat version {major}, expected {NBFORMAT_MAJOR}"),
        ));
    }

    let mut notebook: Notebook = serde_json::from_value(value).map_err(|e| Error::parse(path, e))?;
    normalize_cell_ids(&mut notebook, path);
    Ok(notebook)
}

/// Give every cell a unique id when the format version requires one.
fn normalize_cell_ids(notebook: &mut Notebook, path: &Path) {
    if !notebook.requires_cell_ids() {
        return;
    }

    let mut seen = HashSet::new();
    let mut repaired = 0usize;
    for cell in &mut notebook.cells {
        let keep = cell.id().is_some_and(|id| !id.is_empty() && seen.insert(id.to_string()));
        if keep {
            continue;
        }
        let id = loop {
            let candidate = new_cell_id();
            if seen.insert(candidate.clone()) {
                break candidate;
            }
        };
        cell.set_id(id);
        repaired += 1;
    }

    if repaired > 0 {
        warn!("{:?}: assigned ids to {} cells missing a unique id", path, repaired);
    }
}

fn new_cell_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
