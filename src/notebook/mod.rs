//! In-memory nbformat v4 document: ordered cells, their outputs, and the
//! document-level metadata (`kernelspec`, `language_info`, ...).
pub mod cell;
pub mod output;
pub mod text;

pub use cell::{Cell, CodeCell, TAG_RAISES_EXCEPTION, TAG_SKIP_EXECUTION, TextCell};
pub use output::Output;
pub use text::MultilineString;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only major format version read and written.
pub const NBFORMAT_MAJOR: u32 = 4;
/// Minor version from which every cell carries an `id`.
pub const CELL_ID_MINOR: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub nbformat: u32,
    pub nbformat_minor: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub cells: Vec<Cell>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self {
            nbformat: NBFORMAT_MAJOR,
            nbformat_minor: CELL_ID_MINOR,
            metadata: Map::new(),
            cells: Vec::new(),
        }
    }
}

impl Notebook {
    pub fn with_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }

    pub fn language_info(&self) -> Option<&Value> {
        self.metadata.get("language_info")
    }

    pub fn set_language_info(&mut self, info: Value) {
        self.metadata.insert("language_info".into(), info);
    }

    pub fn code_cells(&self) -> impl Iterator<Item = &CodeCell> {
        self.cells.iter().filter_map(Cell::as_code)
    }

    /// Whether cells of this document are required to carry an `id`.
    pub fn requires_cell_ids(&self) -> bool {
        self.nbformat == NBFORMAT_MAJOR && self.nbformat_minor >= CELL_ID_MINOR
    }
}
