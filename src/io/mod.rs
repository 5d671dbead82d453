//! I/O layer for notebook documents.
//! Provides the nbformat `reader` (parse + normalise) and the `writer`
//! (serialise + atomic write, and the write-on-drop `NotebookGuard`).
pub mod reader;
pub use reader::{parse_notebook, read_notebook};

pub mod writer;
pub use writer::{NotebookGuard, notebook_to_string, write_notebook};
